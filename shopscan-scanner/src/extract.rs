// Company name / telephone extraction from a shop's legal-info page

use crate::classify::ShopLink;
use crate::client::HttpFetcher;
use crate::encoding::encoding_for_label;
use crate::error::{FetchError, Result};
use encoding_rs::Encoding;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const NOT_FOUND: &str = "Not Found";
pub const INFO_PAGE_SUFFIX: &str = "/info.html";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Forces a text encoding (e.g. `euc-jp`) instead of detecting one
    pub encoding: Option<String>,
    pub timeout_secs: f64,
    pub legal_entity_markers: Vec<String>,
    pub stop_markers: Vec<String>,
    pub telephone_labels: Vec<String>,
    /// Characters kept on either side of the legal-entity marker
    pub company_window: usize,
    /// Bases tried as `{base}/{token}/info.html` when the primary info page fails
    pub fallback_bases: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            encoding: None,
            timeout_secs: 15.0,
            legal_entity_markers: vec!["株式会社".to_string()],
            stop_markers: [
                "〒",
                "TEL:",
                "FAX:",
                "代表者:",
                "店舗運営責任者:",
                "店舗セキュリティ責任者:",
                "購入履歴",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            telephone_labels: vec!["TEL:".to_string()],
            company_window: 30,
            fallback_bases: vec![
                "https://www.rakuten.co.jp".to_string(),
                "https://www.rakuten.ne.jp/gold".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub company_name: Option<String>,
    pub telephone: Option<String>,
}

impl CompanyInfo {
    pub fn company_name_or_sentinel(&self) -> String {
        self.company_name.clone().unwrap_or_else(|| NOT_FOUND.to_string())
    }

    pub fn telephone_or_sentinel(&self) -> String {
        self.telephone.clone().unwrap_or_else(|| NOT_FOUND.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.company_name.is_none() && self.telephone.is_none()
    }
}

/// Result of extracting one shop, including which page the data came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The info page that answered, or the primary one when none did
    pub info_url: String,
    pub info: CompanyInfo,
    /// Set when no info page could be fetched at all
    pub error: Option<FetchError>,
}

/// Info page URL for a canonical shop URL.
pub fn info_url_for(shop_url: &str) -> String {
    format!("{}{}", shop_url.trim_end_matches('/'), INFO_PAGE_SUFFIX)
}

/// Pure parsing half of the extractor: DOM narrowing, then bounded text matching.
pub struct InfoParser {
    markers: Vec<String>,
    stop_markers: Vec<String>,
    telephone: Vec<Regex>,
    window: usize,
    dl_selector: Selector,
    dt_selector: Selector,
}

impl InfoParser {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let telephone = config
            .telephone_labels
            .iter()
            .map(|label| Regex::new(&format!(r"{}\s*([\d\-]+)", regex::escape(label))))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            markers: config.legal_entity_markers.clone(),
            stop_markers: config.stop_markers.clone(),
            telephone,
            window: config.company_window,
            dl_selector: Selector::parse("dl").expect("static selector"),
            dt_selector: Selector::parse("dt").expect("static selector"),
        })
    }

    pub fn parse(&self, html: &str) -> CompanyInfo {
        let document = Html::parse_document(html);
        let info = CompanyInfo {
            company_name: self.company_name(&document),
            telephone: self.telephone(&document),
        };
        if info.company_name.is_none() {
            debug!("No legal-entity marker found in any <dt> of the first <dl>");
        }
        info
    }

    fn company_name(&self, document: &Html) -> Option<String> {
        let dl = document.select(&self.dl_selector).next()?;
        dl.select(&self.dt_selector)
            .map(|dt| flatten_text(&dt))
            .filter(|text| !text.is_empty())
            .find_map(|text| self.match_company(&text))
    }

    /// Cut the company name out of one flattened `<dt>` text.
    ///
    /// The result spans at most `window` characters before and after the
    /// marker. The tail ends at the first stop marker after the legal-entity
    /// marker. The head is the whitespace-free run directly in front of the
    /// marker, and never reaches back past a stop marker.
    pub fn match_company(&self, text: &str) -> Option<String> {
        let (marker_start, marker) = self
            .markers
            .iter()
            .filter(|m| !m.is_empty())
            .filter_map(|m| text.find(m.as_str()).map(|pos| (pos, m.as_str())))
            .min_by_key(|(pos, _)| *pos)?;
        let marker_end = marker_start + marker.len();

        let head = &text[..marker_start];
        let head = take_last_chars(head, self.window);
        let head = match self.last_stop_marker_end(head) {
            Some(end) => &head[end..],
            None => head,
        };
        let head = match head.rfind(char::is_whitespace) {
            Some(pos) => {
                let ws_len = head[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
                &head[pos + ws_len..]
            }
            None => head,
        };

        let tail = &text[marker_end..];
        let tail = match self.first_stop_marker_start(tail) {
            Some(start) => &tail[..start],
            None => tail,
        };
        let tail = take_first_chars(tail, self.window);

        let name = format!("{}{}{}", head, marker, tail);
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    fn telephone(&self, document: &Html) -> Option<String> {
        document
            .root_element()
            .text()
            .find_map(|node| {
                self.telephone
                    .iter()
                    .find_map(|re| re.captures(node))
                    .map(|caps| caps[1].to_string())
            })
    }

    fn last_stop_marker_end(&self, text: &str) -> Option<usize> {
        self.stop_markers
            .iter()
            .filter(|m| !m.is_empty())
            .filter_map(|m| text.rfind(m.as_str()).map(|pos| pos + m.len()))
            .max()
    }

    fn first_stop_marker_start(&self, text: &str) -> Option<usize> {
        self.stop_markers
            .iter()
            .filter(|m| !m.is_empty())
            .filter_map(|m| text.find(m.as_str()))
            .min()
    }
}

/// Text of an element with whitespace collapsed to single spaces.
fn flatten_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn take_last_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

fn take_first_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub struct InfoExtractor {
    fetcher: HttpFetcher,
    parser: InfoParser,
    encoding: Option<&'static Encoding>,
    timeout: Duration,
    fallback_bases: Vec<String>,
}

impl InfoExtractor {
    pub fn new(fetcher: HttpFetcher, config: &ExtractorConfig) -> Result<Self> {
        let encoding = config
            .encoding
            .as_deref()
            .filter(|label| !label.trim().is_empty())
            .map(encoding_for_label)
            .transpose()?;

        Ok(Self {
            fetcher,
            parser: InfoParser::new(config)?,
            encoding,
            timeout: Duration::from_secs_f64(config.timeout_secs.max(0.0)),
            fallback_bases: config.fallback_bases.clone(),
        })
    }

    pub fn parser(&self) -> &InfoParser {
        &self.parser
    }

    /// Fetch and parse one info page.
    pub async fn fetch_company_info(
        &self,
        info_url: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<CompanyInfo, FetchError> {
        let page = self
            .fetcher
            .get_with_timeout(info_url, Some(self.timeout), cancel)
            .await?;
        let html = page.text(self.encoding);
        Ok(self.parser.parse(&html))
    }

    /// Extract a discovered shop, falling back to the alternate info page
    /// locations when the primary one cannot be fetched.
    pub async fn extract(&self, shop: &ShopLink, cancel: &CancellationToken) -> Extraction {
        let primary = info_url_for(&shop.shop_url);
        let mut candidates = vec![primary.clone()];
        for base in &self.fallback_bases {
            let candidate = format!("{}/{}{}", base.trim_end_matches('/'), shop.token, INFO_PAGE_SUFFIX);
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        let mut last_error = None;
        for candidate in &candidates {
            info!("Fetching legal info page {}", candidate);
            match self.fetch_company_info(candidate, cancel).await {
                Ok(info) => {
                    return Extraction {
                        info_url: candidate.clone(),
                        info,
                        error: None,
                    };
                }
                Err(e) if e.is_cancelled() => {
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    debug!("Info page {} unavailable: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(ref e) = last_error
            && !e.is_cancelled()
        {
            warn!("No info page for {}: {}", shop.shop_url, e);
        }

        Extraction {
            info_url: primary,
            info: CompanyInfo::default(),
            error: last_error,
        }
    }

    /// Extract from a known info URL only, without fallbacks.
    pub async fn extract_url(&self, info_url: &str, cancel: &CancellationToken) -> Extraction {
        match self.fetch_company_info(info_url, cancel).await {
            Ok(info) => Extraction {
                info_url: info_url.to_string(),
                info,
                error: None,
            },
            Err(e) => {
                if !e.is_cancelled() {
                    warn!("No info page at {}: {}", info_url, e);
                }
                Extraction {
                    info_url: info_url.to_string(),
                    info: CompanyInfo::default(),
                    error: Some(e),
                }
            }
        }
    }
}
