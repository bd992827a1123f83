pub mod classify;
pub mod client;
pub mod collector;
pub mod encoding;
pub mod error;
pub mod extract;
pub mod pacing;
pub mod paginate;
pub mod search;

pub use classify::{LinkShape, MarketplaceConfig, ShopLink, UrlClassifier};
pub use client::{ClientConfig, FetchedPage, HttpFetcher};
pub use collector::{LinkCollector, LinkSet, PageLinks};
pub use error::{FetchError, ScanError};
pub use extract::{CompanyInfo, Extraction, ExtractorConfig, InfoExtractor, NOT_FOUND};
pub use pacing::{DelayRange, RetryPolicy};
pub use paginate::{PaginationWalker, WalkReport, WalkState};
pub use search::{KeywordSearch, SearchConfig, SearchHit, SearchReport};
