use std::net::SocketAddr;

use anyhow::Context as _;
use clap::Parser;

use bookscrape::api::AppState;
use bookscrape::cli::{CrawlOptions, StorageOptions};
use bookscrape::crawl::CrawlConfig;
use bookscrape::store::BookStore;

#[derive(Debug, Parser)]
#[command(author, version, about = "Read-only JSON API over the scraped book store")]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: SocketAddr,

    /// Re-crawl the catalogue and repopulate the store before serving.
    #[arg(long)]
    crawl: bool,

    #[command(flatten)]
    crawl_options: CrawlOptions,

    #[command(flatten)]
    storage: StorageOptions,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookscrape::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting bookscrape-api");

    let store_path = args.storage.store_path();
    if args.crawl {
        let config = CrawlConfig::from_options(&args.crawl_options)?;
        let csv_path = args.storage.csv_path();
        tokio::task::block_in_place(|| {
            bookscrape::crawl::populate(&config, &csv_path, &store_path)
        })
        .context("refresh store before serving")?;
    }

    let store = BookStore::open(&store_path).context("open book store")?;
    tracing::info!(
        path = %store.path().display(),
        books = store.len(),
        populated_at = store.populated_at().unwrap_or("never"),
        "loaded book store"
    );
    if store.is_empty() {
        tracing::warn!("book store is empty; run `bookscrape crawl` or start with --crawl");
    }

    bookscrape::api::serve(args.addr, AppState::new(store)).await
}
