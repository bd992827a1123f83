use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

fn config_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-c --"config" <PATH>)
            .required(false)
            .help("JSON config file; flags below override its values"),
    )
    .arg(
        arg!(--"encoding" <LABEL>)
            .required(false)
            .help("Force the text encoding of info pages, e.g. euc-jp (default: detect)"),
    )
    .arg(
        arg!(-o --"output-dir" <PATH>)
            .required(false)
            .help("Directory for timestamped result batches")
            .default_value("csv_data"),
    )
}

fn registry_arg(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-r --"registry" <PATH>)
            .required(false)
            .help("CSV of already known shops (shop_url column); new shops are appended")
            .default_value("rakuten_scraping.csv"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("shopscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("shopscan")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress progress bars and non-essential output").required(false))
        .arg(arg!(-v --"verbose" "Log debug output (RUST_LOG takes precedence)").required(false))
        .subcommand_required(true)
        .subcommand(registry_arg(config_args(
            command!("crawl")
                .about(
                    "Paginate through listing pages, discover new shops and extract their \
                company name and phone number.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Listing page to start from")
                        .value_parser(clap::value_parser!(Url))
                        .conflicts_with("seeds-file"),
                )
                .arg(
                    arg!(-s --"seeds-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of listing URLs")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-m --"max-pages" <NUM_PAGES>)
                        .required(false)
                        .help("Maximum listing pages per seed (default: 5)")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )))
        .subcommand(registry_arg(config_args(
            command!("search")
                .about("Discover new shops through the item search API and extract them.")
                .arg(
                    arg!(-k --"keyword" <KEYWORD>)
                        .required(false)
                        .help("Search keyword")
                        .conflicts_with("seeds-file"),
                )
                .arg(
                    arg!(-s --"seeds-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of keywords")
                        .value_parser(clap::value_parser!(std::path::PathBuf))
                        .conflicts_with("keyword"),
                )
                .arg(
                    arg!(--"app-id" <ID>)
                        .required(false)
                        .help("Search API application id (default: $RAKUTEN_APPLICATION_ID)"),
                )
                .arg(
                    arg!(-m --"max-pages" <NUM_PAGES>)
                        .required(false)
                        .help("Maximum API result pages per keyword (default: 100)")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )))
        .subcommand(
            command!("extract")
                .about("Extract the company name and phone number of a single shop")
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("Shop, item or info.html URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("JSON config file"),
                )
                .arg(
                    arg!(--"encoding" <LABEL>)
                        .required(false)
                        .help("Force the text encoding of the info page, e.g. euc-jp"),
                ),
        )
        .subcommand(config_args(
            command!("recheck")
                .about(
                    "Re-extract every shop of an existing table (shop_url and optional \
                info_url columns) into a new batch. The registry is not touched.",
                )
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("CSV with a shop_url and/or info_url column")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                ),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_valid() {
        command_argument_builder().debug_assert();
    }

    #[test]
    fn test_crawl_defaults() {
        let matches = command_argument_builder()
            .try_get_matches_from(["shopscan", "crawl", "-u", "https://www.rakuten.co.jp/category/100/"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "crawl");
        assert_eq!(sub.get_one::<String>("registry").unwrap(), "rakuten_scraping.csv");
        assert_eq!(sub.get_one::<String>("output-dir").unwrap(), "csv_data");
        assert!(sub.get_one::<usize>("max-pages").is_none());
    }

    #[test]
    fn test_url_conflicts_with_seeds_file() {
        let result = command_argument_builder().try_get_matches_from([
            "shopscan",
            "crawl",
            "-u",
            "https://www.rakuten.co.jp/category/100/",
            "-s",
            "seeds.txt",
        ]);
        assert!(result.is_err());
    }
}
