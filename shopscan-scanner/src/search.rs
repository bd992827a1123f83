// Keyword discovery through the Ichiba item search API

use crate::client::HttpFetcher;
use crate::error::{FetchError, Result, ScanError};
use crate::pacing::DelayRange;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_SEARCH_ENDPOINT: &str =
    "https://app.rakuten.co.jp/services/api/IchibaItem/Search/20220601";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub application_id: Option<String>,
    pub hits_per_page: u32,
    pub max_pages: u32,
    pub timeout_secs: f64,
    /// Pause between two API pages
    pub page_delay: DelayRange,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            application_id: None,
            hits_per_page: 30,
            max_pages: 100,
            timeout_secs: 10.0,
            page_delay: DelayRange::none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub item_url: String,
    pub shop_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    pub hits: Vec<SearchHit>,
    pub pages_fetched: u32,
    /// The failure that ended the search early, if any
    pub error: Option<FetchError>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Items", default)]
    items: Vec<ItemWrapper>,
    #[serde(rename = "pageCount", default)]
    page_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ItemWrapper {
    #[serde(rename = "Item")]
    item: ItemFields,
}

#[derive(Debug, Deserialize)]
struct ItemFields {
    #[serde(rename = "itemUrl", default)]
    item_url: String,
    #[serde(rename = "shopCode", default)]
    shop_code: String,
}

pub struct KeywordSearch {
    fetcher: HttpFetcher,
    config: SearchConfig,
    application_id: String,
}

impl KeywordSearch {
    pub fn new(fetcher: HttpFetcher, config: SearchConfig) -> Result<Self> {
        let application_id = config
            .application_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(ScanError::MissingApplicationId)?;

        Ok(Self {
            fetcher,
            config,
            application_id,
        })
    }

    /// Page through search results for `keyword`, keeping one hit per shop.
    ///
    /// Shops for which `is_known` returns true are skipped. The search stops
    /// on an empty page, on the last page the API reports, on `max_pages` or
    /// on the first failed page.
    pub async fn search<F>(
        &self,
        keyword: &str,
        is_known: F,
        cancel: &CancellationToken,
    ) -> SearchReport
    where
        F: Fn(&str) -> bool,
    {
        info!("Searching items for keyword '{}'", keyword);

        let timeout = Duration::from_secs_f64(self.config.timeout_secs.max(0.0));
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = SearchReport::default();

        for page in 1..=self.config.max_pages {
            if page > 1 && !self.config.page_delay.pause(cancel).await {
                report.error = Some(FetchError::Cancelled);
                break;
            }

            let query = [
                ("applicationId", self.application_id.clone()),
                ("keyword", keyword.to_string()),
                ("format", "json".to_string()),
                ("hits", self.config.hits_per_page.to_string()),
                ("page", page.to_string()),
            ];

            let response = match self
                .fetcher
                .get_query(&self.config.endpoint, &query, Some(timeout), cancel)
                .await
                .and_then(|fetched| parse_response(&self.config.endpoint, &fetched.body))
            {
                Ok(response) => response,
                Err(e) => {
                    if !e.is_cancelled() {
                        warn!("Item search for '{}' failed on page {}: {}", keyword, page, e);
                    }
                    report.error = Some(e);
                    break;
                }
            };
            report.pages_fetched = page;

            if response.items.is_empty() {
                debug!("Page {} for '{}' is empty", page, keyword);
                break;
            }

            for wrapper in response.items {
                let ItemFields { item_url, shop_code } = wrapper.item;
                if shop_code.is_empty() || is_known(&shop_code) || !seen.insert(shop_code.clone())
                {
                    continue;
                }
                report.hits.push(SearchHit { item_url, shop_code });
            }

            if response.page_count.is_some_and(|count| page >= count) {
                break;
            }
        }

        info!(
            "Keyword '{}': {} new shop(s) over {} page(s)",
            keyword,
            report.hits.len(),
            report.pages_fetched
        );
        report
    }
}

fn parse_response(url: &str, body: &[u8]) -> std::result::Result<SearchResponse, FetchError> {
    serde_json::from_slice(body).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
