use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Host layout of the marketplace. Defaults describe Rakuten Ichiba.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceConfig {
    pub scheme: String,
    /// Hosts serving storefront pages, e.g. `www.rakuten.co.jp`
    pub storefront_hosts: Vec<String>,
    /// Host serving item pages, e.g. `item.rakuten.co.jp`
    pub item_host: String,
    /// Host used when building a storefront URL from an item URL
    pub primary_host: String,
    /// Optional sub-path in front of the shop token (`gold/{token}/`)
    pub gold_prefix: String,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            storefront_hosts: vec![
                "www.rakuten.co.jp".to_string(),
                "www.rakuten.ne.jp".to_string(),
            ],
            item_host: "item.rakuten.co.jp".to_string(),
            primary_host: "www.rakuten.co.jp".to_string(),
            gold_prefix: "gold".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkShape {
    Storefront,
    Item,
}

/// A link that identifies a seller, reduced to its canonical storefront URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopLink {
    pub token: String,
    pub shop_url: String,
    pub shape: LinkShape,
}

pub struct UrlClassifier {
    storefront: Regex,
    item: Regex,
    scheme: String,
    primary_host: String,
}

impl UrlClassifier {
    pub fn new(config: &MarketplaceConfig) -> Result<Self> {
        let hosts = config
            .storefront_hosts
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");
        let scheme = regex::escape(&config.scheme);
        let gold = regex::escape(config.gold_prefix.trim_matches('/'));

        let storefront = Regex::new(&format!(
            r"^{scheme}://(?:{hosts})/(?:{gold}/)?([^/?#]+)/*$"
        ))?;
        let item = Regex::new(&format!(
            r"^{scheme}://{}/([^/?#]+)/(\d+)/?$",
            regex::escape(&config.item_host)
        ))?;

        Ok(Self {
            storefront,
            item,
            scheme: config.scheme.clone(),
            primary_host: config.primary_host.clone(),
        })
    }

    /// Classify a raw link. `None` means "not a shop or item link", never an error.
    pub fn classify(&self, url: &str) -> Option<ShopLink> {
        let url = url.trim();

        if let Some(caps) = self.storefront.captures(url) {
            return Some(ShopLink {
                token: caps[1].to_string(),
                shop_url: format!("{}/", url.trim_end_matches('/')),
                shape: LinkShape::Storefront,
            });
        }

        self.item.captures(url).map(|caps| {
            let token = caps[1].to_string();
            ShopLink {
                shop_url: self.storefront_url(&token),
                token,
                shape: LinkShape::Item,
            }
        })
    }

    /// Shop token of a storefront or item URL.
    pub fn shop_token(&self, url: &str) -> Option<String> {
        self.classify(url).map(|link| link.token)
    }

    /// Canonical storefront URL for a bare shop token.
    pub fn storefront_url(&self, token: &str) -> String {
        format!("{}://{}/{}/", self.scheme, self.primary_host, token)
    }

    /// New shops among `links`, in first-seen order.
    ///
    /// Tokens for which `is_known` returns true are skipped, as are repeats of a
    /// token already emitted; scanning always continues to the end.
    pub fn new_shops<'a, I, F>(&self, links: I, is_known: F) -> Vec<ShopLink>
    where
        I: IntoIterator<Item = &'a str>,
        F: Fn(&str) -> bool,
    {
        let mut seen = HashSet::new();
        let mut shops = Vec::new();

        for link in links {
            let Some(shop) = self.classify(link) else {
                continue;
            };
            if is_known(&shop.token) || !seen.insert(shop.token.clone()) {
                continue;
            }
            shops.push(shop);
        }

        shops
    }

    /// Links of the item shape, in order.
    pub fn item_links<'a, I>(&self, links: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        links
            .into_iter()
            .filter(|l| self.item.is_match(l.trim()))
            .collect()
    }
}
