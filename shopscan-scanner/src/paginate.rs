use crate::collector::{LinkCollector, LinkSet};
use crate::pacing::DelayRange;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub type PageCallback = std::sync::Arc<dyn Fn(usize, String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    HasNextPage,
    NoNextPage,
    PageBudgetExhausted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkReport {
    pub pages_visited: usize,
    pub state: WalkState,
    /// Page URLs in the order they were collected
    pub visited: Vec<String>,
}

/// Follows "next page" links from a listing page, feeding every page into the
/// run's LinkSet.
pub struct PaginationWalker<'a> {
    collector: &'a LinkCollector,
    max_pages: usize,
    delay: DelayRange,
    page_callback: Option<PageCallback>,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(collector: &'a LinkCollector, max_pages: usize) -> Self {
        Self {
            collector,
            max_pages,
            delay: DelayRange::new(1000, 1500),
            page_callback: None,
        }
    }

    pub fn with_delay(mut self, delay: DelayRange) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_page_callback(mut self, callback: PageCallback) -> Self {
        self.page_callback = Some(callback);
        self
    }

    pub async fn walk(
        &self,
        start_url: &str,
        links: &mut LinkSet,
        cancel: &CancellationToken,
    ) -> WalkReport {
        let mut current = start_url.to_string();
        let mut visited: Vec<String> = Vec::new();
        let mut visited_set: HashSet<String> = HashSet::new();
        let mut state = WalkState::HasNextPage;

        while state == WalkState::HasNextPage {
            if visited.len() >= self.max_pages {
                state = WalkState::PageBudgetExhausted;
                break;
            }

            if let Some(ref callback) = self.page_callback {
                callback(visited.len() + 1, current.clone());
            }
            info!("Crawling page {} of at most {}: {}", visited.len() + 1, self.max_pages, current);

            let page = match self.collector.fetch_links(&current, links, cancel).await {
                Ok(page) => page,
                Err(e) if e.is_cancelled() => {
                    state = WalkState::Cancelled;
                    break;
                }
                Err(e) => {
                    warn!("Stopping pagination at {}: {}", current, e);
                    state = WalkState::NoNextPage;
                    break;
                }
            };

            visited_set.insert(current.clone());
            visited.push(current.clone());

            state = match page.next_page {
                Some(next) if visited_set.contains(&next) => {
                    warn!("Next page {} was already visited", next);
                    WalkState::NoNextPage
                }
                Some(next) if visited.len() < self.max_pages => {
                    if !self.delay.pause(cancel).await {
                        WalkState::Cancelled
                    } else {
                        current = next;
                        WalkState::HasNextPage
                    }
                }
                Some(_) => WalkState::PageBudgetExhausted,
                None => {
                    info!("No next page after {}", current);
                    WalkState::NoNextPage
                }
            };
        }

        info!(
            "Pagination finished after {} page(s): {:?}, {} links collected",
            visited.len(),
            state,
            links.len()
        );

        WalkReport {
            pages_visited: visited.len(),
            state,
            visited,
        }
    }
}
