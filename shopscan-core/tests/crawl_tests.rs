// Tests for crawl orchestration

use shopscan_core::config::{PacingConfig, ScanConfig};
use shopscan_core::crawl::{CrawlOptions, SeedMode, execute_crawl, generate_crawl_report};
use shopscan_core::recheck::{RecheckOptions, execute_recheck};
use shopscan_scanner::{MarketplaceConfig, RetryPolicy, WalkState};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Fixtures
// ============================================================================

/// Config pointing every marketplace host at the mock server, with no pacing.
fn test_config(server: &MockServer) -> ScanConfig {
    let host = server.uri().trim_start_matches("http://").to_string();
    let mut config = ScanConfig {
        max_pages: 5,
        pacing: PacingConfig::none(),
        marketplace: MarketplaceConfig {
            scheme: "http".to_string(),
            storefront_hosts: vec![host.clone()],
            item_host: host.clone(),
            primary_host: host,
            gold_prefix: "gold".to_string(),
        },
        ..ScanConfig::default()
    };
    config.client.retry = RetryPolicy::no_retries();
    config.extractor.fallback_bases = vec![];
    config
}

async fn mount_html(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_bytes(html.into_bytes()),
        )
        .mount(server)
        .await;
}

async fn mount_info(server: &MockServer, token: &str, company: &str, tel: &str) {
    mount_html(
        server,
        &format!("/{token}/info.html"),
        format!("<html><body><dl><dt>〒100-0001 {company} TEL:{tel}</dt></dl></body></html>"),
    )
    .await;
}

fn options(config: ScanConfig, seeds: Vec<String>, dir: &Path) -> CrawlOptions {
    CrawlOptions {
        seeds,
        mode: SeedMode::Url,
        config,
        registry_path: dir.join("registry.csv"),
        output_dir: dir.join("out"),
        show_progress_bars: false,
    }
}

// ============================================================================
// URL Mode Tests
// ============================================================================

#[tokio::test]
async fn test_crawl_extracts_new_shops_and_grows_registry() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_html(
        &server,
        "/category/100/",
        format!(
            r#"<html><body>
                <a href="{uri}/alpha/1001/">item</a>
                <a href="{uri}/gold/beta/">gold store</a>
                <a href="{uri}/alpha/">store</a>
                <a href="{uri}/known/77/">known item</a>
                <a href="/help/">help</a>
            </body></html>"#
        ),
    )
    .await;
    mount_info(&server, "alpha", "アルファ株式会社", "03-1111-2222").await;
    Mock::given(method("GET"))
        .and(path("/gold/beta/info.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("registry.csv"),
        format!("\u{feff}shop_url\n{uri}/known/\n"),
    )
    .unwrap();

    let summaries = execute_crawl(
        options(
            test_config(&server),
            vec![format!("{uri}/category/100/")],
            temp_dir.path(),
        ),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.pages_visited, 1);
    assert_eq!(summary.walk_state, Some(WalkState::NoNextPage));
    assert_eq!(summary.links_collected, 5);
    assert_eq!(summary.item_links, 2);
    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.failed_extractions, 1);

    let alpha = &summary.records[0];
    assert_eq!(alpha.shop_url, format!("{uri}/alpha/"));
    assert_eq!(alpha.info_url, format!("{uri}/alpha/info.html"));
    assert_eq!(alpha.company_name, "アルファ株式会社");
    assert_eq!(alpha.telephone, "03-1111-2222");

    let beta = &summary.records[1];
    assert_eq!(beta.shop_url, format!("{uri}/gold/beta/"));
    assert_eq!(beta.company_name, "Not Found");
    assert_eq!(beta.telephone, "Not Found");

    // the known shop was rediscovered through an item link and skipped
    assert!(summary.records.iter().all(|r| !r.shop_url.contains("known")));

    let batch = fs::read_to_string(summary.batch_path.as_ref().unwrap()).unwrap();
    assert!(batch.starts_with("\u{feff}shop_url,info_url,company_name,telephone\n"));
    assert_eq!(batch.lines().count(), 3);

    let registry = fs::read_to_string(temp_dir.path().join("registry.csv")).unwrap();
    assert_eq!(
        registry,
        format!("\u{feff}shop_url\n{uri}/known/\n{uri}/alpha/\n{uri}/gold/beta/\n")
    );
}

#[tokio::test]
async fn test_pagination_budget_applies_to_crawl() {
    let server = MockServer::start().await;
    let uri = server.uri();

    for page in 1..=5 {
        let next = format!(r#"<a class="item -next nextPage" href="?p={}">次へ</a>"#, page + 1);
        Mock::given(method("GET"))
            .and(path("/search/mall/bag/"))
            .and(query_param("p", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(
                        format!(r#"<a href="{uri}/shop{page}/{page}/">i</a>{next}"#).into_bytes(),
                    ),
            )
            .mount(&server)
            .await;
    }
    for page in 1..=3 {
        mount_info(&server, &format!("shop{page}"), &format!("店{page}株式会社"), "0120-000-000").await;
    }

    let mut config = test_config(&server);
    config.max_pages = 3;
    let temp_dir = TempDir::new().unwrap();

    let summaries = execute_crawl(
        options(config, vec![format!("{uri}/search/mall/bag/?p=1")], temp_dir.path()),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let summary = &summaries[0];
    assert_eq!(summary.pages_visited, 3);
    assert_eq!(summary.walk_state, Some(WalkState::PageBudgetExhausted));
    let tokens: Vec<&str> = summary.records.iter().map(|r| r.company_name.as_str()).collect();
    assert_eq!(tokens, vec!["店1株式会社", "店2株式会社", "店3株式会社"]);
}

#[tokio::test]
async fn test_shops_from_one_seed_are_known_to_the_next() {
    let server = MockServer::start().await;
    let uri = server.uri();

    mount_html(
        &server,
        "/category/1/",
        format!(r#"<a href="{uri}/alpha/1/">a</a>"#),
    )
    .await;
    mount_html(
        &server,
        "/category/2/",
        format!(r#"<a href="{uri}/alpha/">a</a><a href="{uri}/beta/2/">b</a>"#),
    )
    .await;
    mount_info(&server, "alpha", "アルファ株式会社", "03-1111-2222").await;
    mount_info(&server, "beta", "ベータ株式会社", "03-3333-4444").await;

    let temp_dir = TempDir::new().unwrap();
    let summaries = execute_crawl(
        options(
            test_config(&server),
            vec![format!("{uri}/category/1/"), format!("{uri}/category/2/")],
            temp_dir.path(),
        ),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].records.len(), 1);
    assert_eq!(summaries[1].records.len(), 1);
    assert_eq!(summaries[1].records[0].company_name, "ベータ株式会社");
    assert_ne!(summaries[0].batch_path, summaries[1].batch_path);
}

#[tokio::test]
async fn test_unreachable_seed_still_writes_empty_batch() {
    let server = MockServer::start().await;
    let uri = server.uri();
    Mock::given(method("GET"))
        .and(path("/category/404/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let summaries = execute_crawl(
        options(
            test_config(&server),
            vec![format!("{uri}/category/404/")],
            temp_dir.path(),
        ),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let summary = &summaries[0];
    assert_eq!(summary.pages_visited, 0);
    assert!(summary.records.is_empty());
    assert!(summary.batch_path.as_ref().unwrap().exists());
    assert!(!temp_dir.path().join("registry.csv").exists());
}

#[tokio::test]
async fn test_cancelled_crawl_starts_no_seed() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summaries = execute_crawl(
        options(
            test_config(&server),
            vec![format!("{}/category/1/", server.uri())],
            temp_dir.path(),
        ),
        None,
        cancel,
    )
    .await
    .unwrap();

    assert!(summaries.is_empty());
}

// ============================================================================
// Keyword Mode Tests
// ============================================================================

#[tokio::test]
async fn test_keyword_mode_without_application_id_fails() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let mut opts = options(test_config(&server), vec!["bag".to_string()], temp_dir.path());
    opts.mode = SeedMode::Keyword;

    assert!(execute_crawl(opts, None, CancellationToken::new()).await.is_err());
}

#[tokio::test]
async fn test_keyword_mode_extracts_search_hits() {
    let server = MockServer::start().await;
    let uri = server.uri();

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("keyword", "bag"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "pageCount": 1,
            "Items": [
                { "Item": { "itemUrl": format!("{uri}/alpha/1/"), "shopCode": "alpha" } },
                { "Item": { "itemUrl": format!("{uri}/known/2/"), "shopCode": "known" } }
            ]
        })))
        .mount(&server)
        .await;
    mount_info(&server, "alpha", "アルファ株式会社", "03-1111-2222").await;

    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("registry.csv"),
        format!("shop_url\n{uri}/known/\n"),
    )
    .unwrap();

    let mut config = test_config(&server);
    config.search.endpoint = format!("{uri}/search");
    config.search.application_id = Some("app".to_string());
    let mut opts = options(config, vec!["bag".to_string()], temp_dir.path());
    opts.mode = SeedMode::Keyword;

    let summaries = execute_crawl(opts, None, CancellationToken::new()).await.unwrap();
    let summary = &summaries[0];
    assert_eq!(summary.walk_state, None);
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].shop_url, format!("{uri}/alpha/"));
    assert_eq!(summary.records[0].company_name, "アルファ株式会社");
}

// ============================================================================
// Recheck Tests
// ============================================================================

#[tokio::test]
async fn test_recheck_writes_batch_without_registry() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_info(&server, "alpha", "アルファ株式会社", "03-1111-2222").await;

    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("shops.csv");
    fs::write(
        &input,
        format!("shop_url,info_url\n{uri}/alpha/,\n{uri}/gone/,{uri}/gone/info.html\n"),
    )
    .unwrap();

    let summary = execute_recheck(
        RecheckOptions {
            input,
            config: test_config(&server),
            output_dir: temp_dir.path().join("out"),
            show_progress_bars: false,
        },
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.records[0].company_name, "アルファ株式会社");
    assert_eq!(summary.records[1].company_name, "Not Found");
    assert_eq!(summary.failed_extractions, 1);
    assert!(summary.batch_path.as_ref().unwrap().exists());
    assert!(!temp_dir.path().join("registry.csv").exists());
}

// ============================================================================
// Report Tests
// ============================================================================

#[tokio::test]
async fn test_report_lists_every_seed() {
    let server = MockServer::start().await;
    let uri = server.uri();
    mount_html(
        &server,
        "/category/1/",
        format!(r#"<a href="{uri}/alpha/1/">a</a>"#),
    )
    .await;
    mount_info(&server, "alpha", "アルファ株式会社", "03-1111-2222").await;

    let temp_dir = TempDir::new().unwrap();
    let summaries = execute_crawl(
        options(
            test_config(&server),
            vec![format!("{uri}/category/1/")],
            temp_dir.path(),
        ),
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap();

    let report = generate_crawl_report(&summaries);
    assert!(report.contains("# Summary:"));
    assert!(report.contains("Seeds processed: 1"));
    assert!(report.contains("New shops extracted: 1"));
    assert!(report.contains("/category/1/"));
    assert!(report.contains("アルファ株式会社"));
    assert!(report.contains("03-1111-2222"));
}
