// Re-extraction of an existing shop table

use crate::config::ScanConfig;
use crate::crawl::{CrawlProgressCallback, Pipeline, RunSummary, SeedMode};
use crate::error::Result;
use crate::record::{ShopRecord, read_shop_table, write_batch};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct RecheckOptions {
    pub input: PathBuf,
    pub config: ScanConfig,
    pub output_dir: PathBuf,
    pub show_progress_bars: bool,
}

/// Fetch the info page of every row in `input` and write one fresh batch.
/// The registry is not read or written.
pub async fn execute_recheck(
    options: RecheckOptions,
    progress_callback: Option<CrawlProgressCallback>,
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let RecheckOptions {
        input,
        config,
        output_dir,
        show_progress_bars,
    } = options;

    let rows = read_shop_table(&input)?;
    let pipeline = Pipeline::new(&config, SeedMode::Url)?;
    info!("Rechecking {} shops from {}", rows.len(), input.display());

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(rows.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .expect("static progress template"),
        );
        Some(pb)
    } else {
        None
    };

    let mut summary = RunSummary::new(&input.display().to_string(), SeedMode::Url);
    summary.shops_found = rows.len();

    for (idx, row) in rows.iter().enumerate() {
        if idx > 0 && !pipeline.shop_delay().pause(&cancel).await {
            summary.cancelled = true;
            break;
        }
        if let Some(ref callback) = progress_callback {
            callback(format!("{}/{}: {}", idx + 1, rows.len(), row.info_url));
        }
        if let Some(ref pb) = progress_bar {
            pb.set_message(row.info_url.clone());
        }

        let extraction = pipeline.extractor.extract_url(&row.info_url, &cancel).await;
        if extraction.error.as_ref().is_some_and(|e| e.is_cancelled()) {
            summary.cancelled = true;
            break;
        }
        if extraction.error.is_some() {
            summary.failed_extractions += 1;
        }
        summary
            .records
            .push(ShopRecord::new(&row.shop_url, &row.info_url, &extraction.info));

        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if summary.cancelled {
        warn!(
            "Recheck cancelled after {} of {} shops",
            summary.records.len(),
            rows.len()
        );
    }
    summary.batch_path = Some(write_batch(&output_dir, &summary.records)?);

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message(format!("Recheck complete! {} shops", summary.records.len()));
    }

    Ok(summary)
}
