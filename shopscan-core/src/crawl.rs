use crate::config::ScanConfig;
use crate::error::Result;
use crate::record::{ShopRecord, write_batch};
use crate::registry::ShopRegistry;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use shopscan_scanner::{
    DelayRange, HttpFetcher, InfoExtractor, KeywordSearch, LinkCollector, LinkSet, LinkShape,
    PaginationWalker, ShopLink, UrlClassifier, WalkState,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

/// What a seed line means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedMode {
    /// A listing page URL to paginate from
    Url,
    /// A keyword for the item search API
    Keyword,
}

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub seeds: Vec<String>,
    pub mode: SeedMode,
    pub config: ScanConfig,
    pub registry_path: PathBuf,
    pub output_dir: PathBuf,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Outcome of one seed.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub seed: String,
    pub mode: SeedMode,
    pub pages_visited: usize,
    /// Final pagination state; `None` for keyword seeds
    pub walk_state: Option<WalkState>,
    pub links_collected: usize,
    /// Collected links of the item-page shape (search hits for keyword seeds)
    pub item_links: usize,
    /// New shops found, including any not extracted because of cancellation
    pub shops_found: usize,
    pub records: Vec<ShopRecord>,
    pub failed_extractions: usize,
    pub batch_path: Option<PathBuf>,
    pub cancelled: bool,
}

impl RunSummary {
    pub(crate) fn new(seed: &str, mode: SeedMode) -> Self {
        Self {
            seed: seed.to_string(),
            mode,
            pages_visited: 0,
            walk_state: None,
            links_collected: 0,
            item_links: 0,
            shops_found: 0,
            records: Vec::new(),
            failed_extractions: 0,
            batch_path: None,
            cancelled: false,
        }
    }
}

/// Everything a run needs, built once from the config.
pub struct Pipeline {
    pub classifier: UrlClassifier,
    pub collector: LinkCollector,
    pub extractor: InfoExtractor,
    search: Option<KeywordSearch>,
    page_delay: DelayRange,
    shop_delay: DelayRange,
    max_pages: usize,
}

impl Pipeline {
    pub fn new(config: &ScanConfig, mode: SeedMode) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.client.clone())?;
        let search = match mode {
            SeedMode::Keyword => Some(KeywordSearch::new(fetcher.clone(), config.search.clone())?),
            SeedMode::Url => None,
        };

        Ok(Self {
            classifier: UrlClassifier::new(&config.marketplace)?,
            collector: LinkCollector::new(fetcher.clone())
                .with_next_page_selector(&config.next_page_selector)?,
            extractor: InfoExtractor::new(fetcher, &config.extractor)?,
            search,
            page_delay: config.pacing.page_delay,
            shop_delay: config.pacing.shop_delay,
            max_pages: config.max_pages,
        })
    }

    pub fn shop_delay(&self) -> DelayRange {
        self.shop_delay
    }

    /// New shops reachable from one seed, with the discovery counters filled in.
    async fn discover(
        &self,
        seed: &str,
        summary: &mut RunSummary,
        registry: &ShopRegistry,
        progress_bar: Option<&ProgressBar>,
        cancel: &CancellationToken,
    ) -> Vec<ShopLink> {
        match (summary.mode, &self.search) {
            (SeedMode::Keyword, Some(search)) => {
                let report = search
                    .search(seed, |code| registry.contains(code), cancel)
                    .await;
                summary.pages_visited = report.pages_fetched as usize;
                summary.links_collected = report.hits.len();
                summary.item_links = report.hits.len();
                summary.cancelled = report.error.as_ref().is_some_and(|e| e.is_cancelled());

                report
                    .hits
                    .into_iter()
                    .map(|hit| ShopLink {
                        shop_url: self.classifier.storefront_url(&hit.shop_code),
                        token: hit.shop_code,
                        shape: LinkShape::Item,
                    })
                    .collect()
            }
            _ => {
                let mut walker = PaginationWalker::new(&self.collector, self.max_pages)
                    .with_delay(self.page_delay);
                if let Some(pb) = progress_bar {
                    let pb = pb.clone();
                    walker = walker.with_page_callback(Arc::new(move |page: usize, url: String| {
                        pb.set_message(format!("Page {}: {}", page, url));
                        pb.tick();
                    }));
                }

                let mut links = LinkSet::new();
                let report = walker.walk(seed, &mut links, cancel).await;
                summary.pages_visited = report.pages_visited;
                summary.walk_state = Some(report.state);
                summary.links_collected = links.len();
                summary.item_links = self.classifier.item_links(links.iter()).len();
                summary.cancelled = report.state == WalkState::Cancelled;

                self.classifier
                    .new_shops(links.iter(), |token| registry.contains(token))
            }
        }
    }

    /// Extract every shop in order, pausing between shops. Stops early on cancel.
    async fn extract_all(
        &self,
        shops: &[ShopLink],
        summary: &mut RunSummary,
        registry: &mut ShopRegistry,
        progress_bar: Option<&ProgressBar>,
        cancel: &CancellationToken,
    ) {
        for (idx, shop) in shops.iter().enumerate() {
            if idx > 0 && !self.shop_delay.pause(cancel).await {
                summary.cancelled = true;
                break;
            }
            if let Some(pb) = progress_bar {
                pb.set_message(format!("Shop {}/{}: {}", idx + 1, shops.len(), shop.token));
            }

            let extraction = self.extractor.extract(shop, cancel).await;
            if extraction.error.as_ref().is_some_and(|e| e.is_cancelled()) {
                summary.cancelled = true;
                break;
            }
            if extraction.error.is_some() {
                summary.failed_extractions += 1;
            }

            registry.insert(&shop.token);
            summary.records.push(ShopRecord::new(
                &shop.shop_url,
                &extraction.info_url,
                &extraction.info,
            ));
            if let Some(pb) = progress_bar {
                pb.inc(1);
            }
        }
    }
}

/// Run one seed end to end: discover, extract, write the batch, grow the registry.
pub async fn run_seed(
    pipeline: &Pipeline,
    seed: &str,
    mode: SeedMode,
    registry: &mut ShopRegistry,
    output_dir: &Path,
    progress_bar: Option<&ProgressBar>,
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    let mut summary = RunSummary::new(seed, mode);

    let shops = pipeline
        .discover(seed, &mut summary, registry, progress_bar, cancel)
        .await;
    summary.shops_found = shops.len();
    info!("{}: {} new shop(s) to extract", seed, shops.len());

    if !summary.cancelled {
        if let Some(pb) = progress_bar {
            pb.set_length(shops.len() as u64);
            pb.set_position(0);
        }
        pipeline
            .extract_all(&shops, &mut summary, registry, progress_bar, cancel)
            .await;
    }

    summary.batch_path = Some(write_batch(output_dir, &summary.records)?);

    let new_urls: Vec<String> = summary.records.iter().map(|r| r.shop_url.clone()).collect();
    registry.append(&new_urls)?;

    Ok(summary)
}

/// Execute a crawl with the given options
/// Returns one summary per seed that was started
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
    cancel: CancellationToken,
) -> Result<Vec<RunSummary>> {
    let CrawlOptions {
        seeds,
        mode,
        config,
        registry_path,
        output_dir,
        show_progress_bars,
    } = options;

    let pipeline = Pipeline::new(&config, mode)?;
    let mut registry = ShopRegistry::load(&registry_path, &pipeline.classifier);

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("static progress template"),
        );
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let mut summaries = Vec::new();
    for (idx, seed) in seeds.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        if let Some(ref callback) = progress_callback {
            callback(format!("Seed {}/{}: {}", idx + 1, seeds.len(), seed));
        }

        let summary = run_seed(
            &pipeline,
            seed,
            mode,
            &mut registry,
            &output_dir,
            progress_bar.as_ref(),
            &cancel,
        )
        .await?;

        if let Some(ref callback) = progress_callback {
            callback(format!(
                "{} new shop(s) from {} page(s), batch {}",
                summary.records.len(),
                summary.pages_visited,
                summary
                    .batch_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ));
        }
        if summary.cancelled {
            warn!("Crawl cancelled during {}", seed);
        }
        summaries.push(summary);
    }

    if let Some(ref pb) = progress_bar {
        let total: usize = summaries.iter().map(|s| s.records.len()).sum();
        pb.finish_with_message(format!("Crawl complete! {} shops extracted", total));
    }

    Ok(summaries)
}

fn seed_label(summary: &RunSummary) -> String {
    match summary.mode {
        SeedMode::Keyword => format!("keyword \"{}\"", summary.seed),
        SeedMode::Url => Url::parse(&summary.seed)
            .ok()
            .map(|u| format!("{}{}", u.host_str().unwrap_or_default(), u.path()))
            .unwrap_or_else(|| summary.seed.clone()),
    }
}

/// Generate a crawl report from run summaries
pub fn generate_crawl_report(summaries: &[RunSummary]) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Seeds processed: {}\n", summaries.len()));

    let pages: usize = summaries.iter().map(|s| s.pages_visited).sum();
    report.push_str(&format!("  Pages visited: {}\n", pages));

    let links: usize = summaries.iter().map(|s| s.links_collected).sum();
    report.push_str(&format!("  Links collected: {}\n", links));

    let items: usize = summaries.iter().map(|s| s.item_links).sum();
    report.push_str(&format!("  Item links: {}\n", items));

    let shops: usize = summaries.iter().map(|s| s.records.len()).sum();
    report.push_str(&format!("  New shops extracted: {}\n", shops));

    let failed: usize = summaries.iter().map(|s| s.failed_extractions).sum();
    report.push_str(&format!("  Info pages unavailable: {}\n", failed));

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    for summary in summaries {
        report.push_str(&format!("## {}\n", seed_label(summary)));

        let state = match summary.walk_state {
            Some(WalkState::PageBudgetExhausted) => "page budget reached".yellow().to_string(),
            Some(WalkState::Cancelled) => "cancelled".red().to_string(),
            Some(WalkState::NoNextPage) | Some(WalkState::HasNextPage) => {
                "last page reached".green().to_string()
            }
            None if summary.cancelled => "cancelled".red().to_string(),
            None => "search finished".green().to_string(),
        };
        report.push_str(&format!(
            "  {} pages, {} links ({} items), {} ({})\n",
            summary.pages_visited,
            summary.links_collected,
            summary.item_links,
            format!("{} new shops", summary.records.len()).bold(),
            state
        ));
        if summary.cancelled && summary.records.len() < summary.shops_found {
            report.push_str(&format!(
                "  {} shop(s) left unextracted\n",
                summary.shops_found - summary.records.len()
            ));
        }

        for record in &summary.records {
            let name = if record.company_name == shopscan_scanner::NOT_FOUND {
                record.company_name.dimmed().to_string()
            } else {
                record.company_name.clone()
            };
            report.push_str(&format!(
                "  {} {} {}\n",
                record.shop_url, name, record.telephone
            ));
        }

        if let Some(ref path) = summary.batch_path {
            report.push_str(&format!("  \x1b[90m{}\x1b[0m\n", path.display()));
        }
        report.push('\n');
    }

    report
}
