use crate::error::Result;
use shopscan_scanner::UrlClassifier;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SHOP_URL_COLUMN: &str = "shop_url";
pub(crate) const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Every shop token seen so far, backed by an append-only CSV file.
///
/// The set only grows. Tokens are added in memory as shops are discovered,
/// while the file receives storefront URLs at the end of a run.
#[derive(Debug)]
pub struct ShopRegistry {
    path: PathBuf,
    tokens: HashSet<String>,
}

impl ShopRegistry {
    /// Load known tokens from the `shop_url` column of `path`.
    ///
    /// A missing, empty or unreadable file gives an empty registry. Bad rows
    /// inside a readable file are skipped and the rest are kept.
    pub fn load(path: impl AsRef<Path>, classifier: &UrlClassifier) -> Self {
        let path = path.as_ref().to_path_buf();
        let tokens = match read_shop_urls(&path) {
            Ok(urls) => urls
                .iter()
                .filter_map(|url| classifier.shop_token(url))
                .collect::<HashSet<_>>(),
            Err(e) => {
                if path.exists() {
                    warn!("Ignoring unreadable registry {}: {}", path.display(), e);
                } else {
                    info!("No registry at {}, starting empty", path.display());
                }
                HashSet::new()
            }
        };

        info!("Loaded {} known shops from {}", tokens.len(), path.display());
        Self { path, tokens }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    /// Returns `true` if the token was new.
    pub fn insert(&mut self, token: &str) -> bool {
        self.tokens.insert(token.to_string())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Append storefront URLs to the registry file in a format `load` reads back.
    ///
    /// Nothing is touched when `shop_urls` is empty. A missing file is created
    /// with a BOM and header first.
    pub fn append(&self, shop_urls: &[String]) -> Result<usize> {
        if shop_urls.is_empty() {
            return Ok(0);
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            file.write_all(UTF8_BOM)?;
            file.write_all(format!("{SHOP_URL_COLUMN}\n").as_bytes())?;
        } else if len == UTF8_BOM.len() as u64 && starts_with_bom(&mut file)? {
            file.write_all(format!("{SHOP_URL_COLUMN}\n").as_bytes())?;
        } else {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        for url in shop_urls {
            writer.write_record([url.as_str()])?;
        }
        writer.flush()?;

        debug!("Appended {} shop URLs to {}", shop_urls.len(), self.path.display());
        Ok(shop_urls.len())
    }
}

fn starts_with_bom(file: &mut fs::File) -> Result<bool> {
    let mut head = [0u8; 3];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut head)?;
    Ok(head == UTF8_BOM)
}

/// Values of the `shop_url` column, with a leading BOM ignored.
///
/// Rows that fail to parse, or whose `shop_url` is not UTF-8, are skipped with
/// a warning. Only a file that cannot be read at all is an error.
pub fn read_shop_urls(path: &Path) -> Result<Vec<String>> {
    let bytes = fs::read(path)?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes[..]);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let headers = reader.byte_headers()?.clone();
    let Some(column) = headers
        .iter()
        .position(|h| h == SHOP_URL_COLUMN.as_bytes())
    else {
        if !headers.is_empty() {
            warn!("{} has no '{}' column", path.display(), SHOP_URL_COLUMN);
        }
        return Ok(Vec::new());
    };

    let mut urls = Vec::new();
    let mut skipped = 0usize;
    for record in reader.byte_records() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!("Skipping bad row in {}: {}", path.display(), e);
                skipped += 1;
                continue;
            }
        };
        let Some(field) = record.get(column).filter(|f| !f.is_empty()) else {
            continue;
        };
        match std::str::from_utf8(field) {
            Ok(url) => urls.push(url.to_string()),
            Err(_) => {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                warn!(
                    "Skipping non-UTF-8 {} on line {} of {}",
                    SHOP_URL_COLUMN,
                    line,
                    path.display()
                );
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} unreadable row(s) in {}", skipped, path.display());
    }
    Ok(urls)
}
