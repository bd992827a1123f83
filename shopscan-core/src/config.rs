// Run configuration: JSON file with every section optional

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use shopscan_scanner::collector::DEFAULT_NEXT_PAGE_SELECTOR;
use shopscan_scanner::{
    ClientConfig, DelayRange, ExtractorConfig, MarketplaceConfig, SearchConfig,
};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause between two listing pages of one seed
    pub page_delay: DelayRange,
    /// Pause between two info page extractions
    pub shop_delay: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            page_delay: DelayRange::new(1000, 1500),
            shop_delay: DelayRange::new(1000, 2000),
        }
    }
}

impl PacingConfig {
    pub fn none() -> Self {
        Self {
            page_delay: DelayRange::none(),
            shop_delay: DelayRange::none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub max_pages: usize,
    pub next_page_selector: String,
    pub client: ClientConfig,
    pub pacing: PacingConfig,
    pub marketplace: MarketplaceConfig,
    pub extractor: ExtractorConfig,
    pub search: SearchConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_pages: 5,
            next_page_selector: DEFAULT_NEXT_PAGE_SELECTOR.to_string(),
            client: ClientConfig::default(),
            pacing: PacingConfig::default(),
            marketplace: MarketplaceConfig::default(),
            extractor: ExtractorConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load a JSON config file. `~` is expanded.
    pub fn load(path: &str) -> Result<Self> {
        let path = expand_path(path);
        let contents = fs::read_to_string(&path).map_err(|e| {
            CoreError::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// The config at `path`, or the defaults when no path is given.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
