pub mod config;
pub mod crawl;
pub mod error;
pub mod recheck;
pub mod record;
pub mod registry;

pub use config::{PacingConfig, ScanConfig};
pub use crawl::{CrawlOptions, RunSummary, SeedMode, execute_crawl, generate_crawl_report};
pub use error::CoreError;
pub use recheck::{RecheckOptions, execute_recheck};
pub use record::ShopRecord;
pub use registry::ShopRegistry;
