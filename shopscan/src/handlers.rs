use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use colored::Colorize;
use shopscan_core::config::{ScanConfig, expand_path};
use shopscan_core::crawl::{
    CrawlOptions, CrawlProgressCallback, Pipeline, SeedMode, execute_crawl, generate_crawl_report,
};
use shopscan_core::recheck::{RecheckOptions, execute_recheck};
use shopscan_scanner::extract::{INFO_PAGE_SUFFIX, info_url_for};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const APPLICATION_ID_ENV: &str = "RAKUTEN_APPLICATION_ID";

/// Install the fmt subscriber. `RUST_LOG` wins over the flags.
pub fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A token cancelled by the first Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "\n{} Interrupted, finishing the current batch...",
                "!".yellow().bold()
            );
            token.cancel();
        }
    });
    cancel
}

// Helper functions for seed loading

/// Load seeds from either a file or a single command-line value
pub fn load_seeds_from_source(
    single: Option<&str>,
    seeds_file: Option<&PathBuf>,
    mode: SeedMode,
) -> Result<Vec<String>, String> {
    if let Some(path) = seeds_file {
        load_seeds_from_file(path, mode)
    } else if let Some(seed) = single {
        Ok(vec![seed.to_string()])
    } else {
        match mode {
            SeedMode::Url => Err("Either --url or --seeds-file must be provided".to_string()),
            SeedMode::Keyword => {
                Err("Either --keyword or --seeds-file must be provided".to_string())
            }
        }
    }
}

/// Load seeds from a newline-delimited file, skipping blank lines
pub fn load_seeds_from_file(path: &PathBuf, mode: SeedMode) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read seeds file {}: {}", path.display(), e))?;

    let lines = content
        .lines()
        .map(|line| line.trim().trim_start_matches('\u{feff}'))
        .filter(|line| !line.is_empty());

    let seeds: Vec<String> = match mode {
        SeedMode::Url => lines.filter_map(parse_url_line).collect(),
        SeedMode::Keyword => lines.map(str::to_string).collect(),
    };

    if seeds.is_empty() {
        return Err(format!("No valid seeds found in {}", path.display()));
    }

    Ok(seeds)
}

/// Parse a single line as a URL, trying to add https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if let Ok(url) = Url::parse(line)
        && matches!(url.scheme(), "http" | "https")
    {
        return Some(line.to_string());
    }

    let with_scheme = format!("https://{}", line);
    if let Ok(url) = Url::parse(&with_scheme)
        && url.host_str().is_some_and(|h| h.contains('.'))
    {
        return Some(with_scheme);
    }

    eprintln!("{}  Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Load the config file (if any) and apply the flags shared by every subcommand.
pub fn build_config(args: &ArgMatches) -> Result<ScanConfig> {
    let path = args.get_one::<String>("config").map(String::as_str);
    let mut config = ScanConfig::load_or_default(path)?;

    if let Some(label) = args.get_one::<String>("encoding") {
        config.extractor.encoding = Some(label.clone());
    }

    Ok(config)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn output_dir(args: &ArgMatches) -> PathBuf {
    expand_path(
        args.get_one::<String>("output-dir")
            .map(String::as_str)
            .unwrap_or("csv_data"),
    )
}

fn registry_path(args: &ArgMatches) -> PathBuf {
    expand_path(
        args.get_one::<String>("registry")
            .map(String::as_str)
            .unwrap_or("rakuten_scraping.csv"),
    )
}

fn progress_printer(quiet: bool) -> Option<CrawlProgressCallback> {
    if quiet {
        None
    } else {
        Some(Arc::new(|msg: String| {
            println!("{} {}", "→".blue(), msg);
        }))
    }
}

pub async fn handle_crawl(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let url = sub_matches.get_one::<Url>("url").map(Url::as_str);
    let seeds_file = sub_matches.get_one::<PathBuf>("seeds-file");
    let seeds = load_seeds_from_source(url, seeds_file, SeedMode::Url).map_err(|e| anyhow!(e))?;

    let mut config = build_config(sub_matches)?;
    if let Some(max_pages) = sub_matches.get_one::<usize>("max-pages") {
        config.max_pages = *max_pages;
    }

    run_crawl(sub_matches, seeds, SeedMode::Url, config, quiet).await
}

pub async fn handle_search(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let keyword = sub_matches.get_one::<String>("keyword").map(String::as_str);
    let seeds_file = sub_matches.get_one::<PathBuf>("seeds-file");
    let seeds =
        load_seeds_from_source(keyword, seeds_file, SeedMode::Keyword).map_err(|e| anyhow!(e))?;

    let mut config = build_config(sub_matches)?;
    if let Some(app_id) = sub_matches.get_one::<String>("app-id") {
        config.search.application_id = Some(app_id.clone());
    } else if config.search.application_id.is_none()
        && let Ok(app_id) = std::env::var(APPLICATION_ID_ENV)
    {
        config.search.application_id = Some(app_id);
    }
    if let Some(max_pages) = sub_matches.get_one::<u32>("max-pages") {
        config.search.max_pages = *max_pages;
    }

    run_crawl(sub_matches, seeds, SeedMode::Keyword, config, quiet).await
}

async fn run_crawl(
    sub_matches: &ArgMatches,
    seeds: Vec<String>,
    mode: SeedMode,
    config: ScanConfig,
    quiet: bool,
) -> Result<()> {
    let registry_path = registry_path(sub_matches);
    let output_dir = output_dir(sub_matches);

    if !quiet {
        print_divider();
        println!(
            "{}",
            format!("  SHOPSCAN {}", if mode == SeedMode::Url { "CRAWL" } else { "SEARCH" })
                .bright_white()
                .bold()
        );
        print_divider();
        println!("{} Seeds: {}", "→".blue(), seeds.len());
        if mode == SeedMode::Url {
            println!("{} Max pages per seed: {}", "→".blue(), config.max_pages);
        }
        println!(
            "{} Registry: {}",
            "→".blue(),
            registry_path.display().to_string().bright_white()
        );
        println!(
            "{} Output: {}\n",
            "→".blue(),
            output_dir.display().to_string().bright_white()
        );
    }

    let options = CrawlOptions {
        seeds,
        mode,
        config,
        registry_path,
        output_dir,
        show_progress_bars: !quiet,
    };

    let cancel = cancel_on_ctrl_c();
    let summaries = execute_crawl(options, progress_printer(quiet), cancel.clone())
        .await
        .context("Crawl failed")?;

    if cancel.is_cancelled() {
        println!("\n{} Crawl interrupted\n", "!".yellow().bold());
    } else {
        println!("\n{} Crawl complete!\n", "✓".green().bold());
    }
    print!("{}", generate_crawl_report(&summaries));
    Ok(())
}

pub async fn handle_extract(sub_matches: &ArgMatches) -> Result<()> {
    let url = sub_matches
        .get_one::<Url>("URL")
        .ok_or_else(|| anyhow!("A shop URL is required"))?;
    let config = build_config(sub_matches)?;
    let pipeline = Pipeline::new(&config, SeedMode::Url)?;
    let cancel = cancel_on_ctrl_c();

    let extraction = if url.path().ends_with(INFO_PAGE_SUFFIX) {
        pipeline.extractor.extract_url(url.as_str(), &cancel).await
    } else if let Some(shop) = pipeline.classifier.classify(url.as_str()) {
        pipeline.extractor.extract(&shop, &cancel).await
    } else {
        warn!("{} is not a known shop URL shape, using it as a storefront", url);
        pipeline
            .extractor
            .extract_url(&info_url_for(url.as_str()), &cancel)
            .await
    };

    if let Some(ref e) = extraction.error {
        eprintln!("{} {}", "✗".red().bold(), e);
    }
    println!("{} {}", "info_url:".blue(), extraction.info_url);
    println!(
        "{} {}",
        "company_name:".blue(),
        extraction.info.company_name_or_sentinel().bright_white()
    );
    println!(
        "{} {}",
        "telephone:".blue(),
        extraction.info.telephone_or_sentinel().bright_white()
    );
    Ok(())
}

pub async fn handle_recheck(sub_matches: &ArgMatches, quiet: bool) -> Result<()> {
    let input = sub_matches
        .get_one::<PathBuf>("input")
        .ok_or_else(|| anyhow!("--input is required"))?;
    let config = build_config(sub_matches)?;

    let options = RecheckOptions {
        input: expand_path(&input.to_string_lossy()),
        config,
        output_dir: output_dir(sub_matches),
        show_progress_bars: !quiet,
    };

    let cancel = cancel_on_ctrl_c();
    let summary = execute_recheck(options, None, cancel)
        .await
        .context("Recheck failed")?;

    println!(
        "\n{} {} shop(s) rechecked, {} info page(s) unavailable",
        "✓".green().bold(),
        summary.records.len(),
        summary.failed_extractions
    );
    if let Some(path) = summary.batch_path {
        println!(
            "{} Batch: {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }
    Ok(())
}
