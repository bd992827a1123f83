// Output batches and input tables

use crate::error::{CoreError, Result};
use crate::registry::{SHOP_URL_COLUMN, UTF8_BOM};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use shopscan_scanner::extract::{CompanyInfo, info_url_for};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BATCH_FILE_SUFFIX: &str = "company_info.csv";

/// One extracted seller. Field order is the batch file's column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopRecord {
    pub shop_url: String,
    pub info_url: String,
    pub company_name: String,
    pub telephone: String,
}

impl ShopRecord {
    pub fn new(shop_url: &str, info_url: &str, info: &CompanyInfo) -> Self {
        Self {
            shop_url: shop_url.to_string(),
            info_url: info_url.to_string(),
            company_name: info.company_name_or_sentinel(),
            telephone: info.telephone_or_sentinel(),
        }
    }
}

/// A row of a table to re-extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopRow {
    pub shop_url: String,
    pub info_url: String,
}

pub fn batch_file_name(at: DateTime<Local>) -> String {
    format!("{}-{}", at.format("%Y-%m-%d_%H-%M-%S-%3f"), BATCH_FILE_SUFFIX)
}

/// Write `records` as a new timestamped batch in `output_dir`.
///
/// The file is written even when there are no records, so every run leaves
/// a batch behind.
pub fn write_batch(output_dir: &Path, records: &[ShopRecord]) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let mut path = output_dir.join(batch_file_name(Local::now()));
    // Two runs within the same millisecond must not share a file
    let mut n = 1;
    while path.exists() {
        path = output_dir.join(format!(
            "{}-{}-{}",
            Local::now().format("%Y-%m-%d_%H-%M-%S-%3f"),
            n,
            BATCH_FILE_SUFFIX
        ));
        n += 1;
    }

    let mut file = File::create(&path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(["shop_url", "info_url", "company_name", "telephone"])?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(path)
}

/// Read a `shop_url[,info_url]` table. Rows without an info URL get the one
/// derived from their shop URL.
pub fn read_shop_table(path: &Path) -> Result<Vec<ShopRow>> {
    let bytes = fs::read(path)
        .map_err(|e| CoreError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader.headers()?.clone();
    let shop_col = headers.iter().position(|h| h == SHOP_URL_COLUMN);
    let info_col = headers.iter().position(|h| h == "info_url");
    if shop_col.is_none() && info_col.is_none() {
        return Err(CoreError::Config(format!(
            "{} needs a '{}' or 'info_url' column",
            path.display(),
            SHOP_URL_COLUMN
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let shop_url = field(shop_col);
        let info_url = field(info_col).or_else(|| shop_url.as_deref().map(info_url_for));
        if let Some(info_url) = info_url {
            rows.push(ShopRow {
                shop_url: shop_url.unwrap_or_default(),
                info_url,
            });
        }
    }

    Ok(rows)
}
