// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{load_seeds_from_file, load_seeds_from_source, parse_url_line};

// Re-export crawl functionality from shopscan-core
pub use shopscan_core::crawl::{
    CrawlOptions, CrawlProgressCallback, RunSummary, SeedMode, execute_crawl,
    generate_crawl_report,
};
