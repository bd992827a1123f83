use shopscan::handlers::*;
use shopscan::{RunSummary, SeedMode, generate_crawl_report};
use shopscan_core::ShopRecord;
use shopscan_scanner::WalkState;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_parse_url_line_with_scheme() {
    let result = parse_url_line("https://search.rakuten.co.jp/search/mall/bag/");
    assert_eq!(
        result,
        Some("https://search.rakuten.co.jp/search/mall/bag/".to_string())
    );
}

#[test]
fn test_parse_url_line_without_scheme() {
    let result = parse_url_line("www.rakuten.co.jp/category/100/");
    assert_eq!(
        result,
        Some("https://www.rakuten.co.jp/category/100/".to_string())
    );
}

#[test]
fn test_parse_url_line_invalid() {
    assert_eq!(parse_url_line("not a valid url!!!"), None);
    assert_eq!(parse_url_line("bag"), None);
}

#[test]
fn test_load_url_seeds_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://www.rakuten.co.jp/category/100/")?;
    writeln!(temp_file, "search.rakuten.co.jp/search/mall/bag/")?;
    writeln!(temp_file)?; // Empty line
    writeln!(temp_file, "  https://www.rakuten.co.jp/category/200/  ")?;

    let path = PathBuf::from(temp_file.path());
    let seeds = load_seeds_from_file(&path, SeedMode::Url)?;

    assert_eq!(seeds.len(), 3);
    assert_eq!(seeds[0], "https://www.rakuten.co.jp/category/100/");
    assert_eq!(seeds[1], "https://search.rakuten.co.jp/search/mall/bag/");
    assert_eq!(seeds[2], "https://www.rakuten.co.jp/category/200/");

    Ok(())
}

#[test]
fn test_load_keyword_seeds_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "\u{feff}バッグ")?;
    writeln!(temp_file, "   ")?;
    writeln!(temp_file, "leather wallet")?;

    let path = PathBuf::from(temp_file.path());
    let seeds = load_seeds_from_file(&path, SeedMode::Keyword)?;

    assert_eq!(seeds, vec!["バッグ", "leather wallet"]);
    Ok(())
}

#[test]
fn test_load_seeds_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let path = PathBuf::from(temp_file.path());
    let result = load_seeds_from_file(&path, SeedMode::Url);

    assert!(result.is_err());
    assert!(result.unwrap_err().contains("No valid seeds"));
}

#[test]
fn test_load_seeds_from_missing_file() {
    let path = PathBuf::from("/nonexistent/seeds.txt");
    let result = load_seeds_from_file(&path, SeedMode::Keyword);
    assert!(result.unwrap_err().contains("Failed to read seeds file"));
}

#[test]
fn test_load_seeds_from_source_single_value() {
    let result = load_seeds_from_source(Some("バッグ"), None, SeedMode::Keyword).unwrap();
    assert_eq!(result, vec!["バッグ"]);
}

#[test]
fn test_load_seeds_from_source_no_input() {
    let result = load_seeds_from_source(None, None, SeedMode::Url);
    assert!(
        result
            .unwrap_err()
            .contains("Either --url or --seeds-file must be provided")
    );

    let result = load_seeds_from_source(None, None, SeedMode::Keyword);
    assert!(result.unwrap_err().contains("--keyword"));
}

#[test]
fn test_generate_crawl_report() {
    let summaries = vec![
        RunSummary {
            seed: "https://www.rakuten.co.jp/category/100/".to_string(),
            mode: SeedMode::Url,
            pages_visited: 3,
            walk_state: Some(WalkState::PageBudgetExhausted),
            links_collected: 120,
            item_links: 90,
            shops_found: 2,
            records: vec![
                ShopRecord {
                    shop_url: "https://www.rakuten.co.jp/alpha/".to_string(),
                    info_url: "https://www.rakuten.co.jp/alpha/info.html".to_string(),
                    company_name: "アルファ株式会社".to_string(),
                    telephone: "03-1111-2222".to_string(),
                },
                ShopRecord {
                    shop_url: "https://www.rakuten.co.jp/beta/".to_string(),
                    info_url: "https://www.rakuten.co.jp/beta/info.html".to_string(),
                    company_name: "Not Found".to_string(),
                    telephone: "Not Found".to_string(),
                },
            ],
            failed_extractions: 1,
            batch_path: Some(PathBuf::from("csv_data/batch-company_info.csv")),
            cancelled: false,
        },
        RunSummary {
            seed: "バッグ".to_string(),
            mode: SeedMode::Keyword,
            pages_visited: 1,
            walk_state: None,
            links_collected: 0,
            item_links: 0,
            shops_found: 0,
            records: vec![],
            failed_extractions: 0,
            batch_path: None,
            cancelled: false,
        },
    ];

    let report = generate_crawl_report(&summaries);

    assert!(report.contains("Seeds processed: 2"));
    assert!(report.contains("Pages visited: 4"));
    assert!(report.contains("Links collected: 120"));
    assert!(report.contains("Item links: 90"));
    assert!(report.contains("120 links (90 items)"));
    assert!(report.contains("New shops extracted: 2"));
    assert!(report.contains("Info pages unavailable: 1"));
    assert!(report.contains("www.rakuten.co.jp/category/100/"));
    assert!(report.contains("keyword \"バッグ\""));
    assert!(report.contains("アルファ株式会社"));
    assert!(report.contains("batch-company_info.csv"));
}
