use crate::client::HttpFetcher;
use crate::error::{FetchError, Result, ScanError};
use scraper::{Html, Selector};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_NEXT_PAGE_SELECTOR: &str = "a.item.-next.nextPage";

/// Run-scoped ordered set of raw hrefs. Never holds the same string twice.
#[derive(Debug, Default, Clone)]
pub struct LinkSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the link was not already present.
    pub fn insert(&mut self, link: &str) -> bool {
        if self.seen.contains(link) {
            return false;
        }
        self.seen.insert(link.to_string());
        self.order.push(link.to_string());
        true
    }

    /// Merge links in order, returning how many were new.
    pub fn extend<'a, I>(&mut self, links: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        links.into_iter().filter(|l| self.insert(l)).count()
    }

    pub fn contains(&self, link: &str) -> bool {
        self.seen.contains(link)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// The first `n` links in discovery order.
    pub fn first(&self, n: usize) -> &[String] {
        &self.order[..n.min(self.order.len())]
    }
}

/// Links found on one listing page.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    pub url: String,
    /// Every anchor href, verbatim, deduplicated in page order
    pub hrefs: Vec<String>,
    /// The next-page anchor, resolved against the page URL
    pub next_page: Option<String>,
    /// How many hrefs were new to the run's LinkSet
    pub added: usize,
}

pub struct LinkCollector {
    fetcher: HttpFetcher,
    next_page_selector: Selector,
}

impl LinkCollector {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher,
            next_page_selector: default_next_page_selector(),
        }
    }

    pub fn with_next_page_selector(mut self, selector: &str) -> Result<Self> {
        self.next_page_selector = parse_selector(selector)?;
        Ok(self)
    }

    /// Fetch `url` and merge its anchors into `links`.
    ///
    /// Only a 200 HTML response counts; anything else comes back as a
    /// `FetchError` for the caller to skip.
    pub async fn fetch_links(
        &self,
        url: &str,
        links: &mut LinkSet,
        cancel: &CancellationToken,
    ) -> std::result::Result<PageLinks, FetchError> {
        info!("Collecting links from {} ({} known)", url, links.len());

        let page = self.fetcher.get(url, cancel).await?;
        if page.status_code != 200 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status_code,
            });
        }
        if !page.is_html() {
            return Err(FetchError::NotHtml {
                url: url.to_string(),
                content_type: page.content_type.clone().unwrap_or_default(),
            });
        }

        let html = page.text(None);
        let mut page_links = parse_listing_page(&html, url, &self.next_page_selector);
        page_links.added = links.extend(page_links.hrefs.iter().map(String::as_str));

        debug!(
            "{}: {} anchors, {} new, next page: {:?}",
            url,
            page_links.hrefs.len(),
            page_links.added,
            page_links.next_page
        );
        Ok(page_links)
    }
}

/// Pull every href and the next-page link out of a listing page.
pub fn parse_listing_page(html: &str, page_url: &str, next_page_selector: &Selector) -> PageLinks {
    let document = Html::parse_document(html);
    let anchor_selector = Selector::parse("a[href]").expect("static selector");

    let mut seen = HashSet::new();
    let hrefs = document
        .select(&anchor_selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.is_empty())
        .filter(|href| seen.insert(*href))
        .map(str::to_string)
        .collect();

    let next_page = document
        .select(next_page_selector)
        .find_map(|a| a.value().attr("href"))
        .and_then(|href| resolve_url(page_url, href));

    PageLinks {
        url: page_url.to_string(),
        hrefs,
        next_page,
        added: 0,
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScanError::SelectorError(format!("{selector}: {e}")))
}

fn default_next_page_selector() -> Selector {
    Selector::parse(DEFAULT_NEXT_PAGE_SELECTOR).expect("static selector")
}

fn resolve_url(base: &str, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }

    let base_url = Url::parse(base).ok()?;
    let mut resolved = base_url.join(href).ok()?;
    resolved.set_fragment(None);

    Some(resolved.to_string())
}
