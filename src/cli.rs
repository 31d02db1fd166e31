use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DATA_DIR_ENV: &str = "BOOKSCRAPE_DATA_DIR";

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Crawl the catalogue, export it to CSV and repopulate the store.
    Crawl(CrawlArgs),
    /// Repopulate the store from a previously exported CSV file.
    Import(ImportArgs),
}

#[derive(Debug, Clone, Args)]
pub struct CrawlOptions {
    /// Site root; listing pages are read from `<base-url>/catalogue/`.
    #[arg(long, default_value = "https://books.toscrape.com/")]
    pub base_url: String,

    /// Delay after each detail page request (politeness).
    #[arg(long, default_value_t = 500)]
    pub delay_ms: u64,

    /// Per-request timeout.
    #[arg(long, default_value_t = 15)]
    pub timeout_secs: u64,

    /// Stop following "next" links after this many listing pages.
    #[arg(long, default_value_t = 100)]
    pub max_pages: usize,

    #[arg(long, default_value = "bookscrape/0.1")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Args)]
pub struct StorageOptions {
    /// Directory holding `books.json` (falls back to `BOOKSCRAPE_DATA_DIR`, then `data`).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// CSV export path (default: `<data-dir>/books_data.csv`).
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

impl StorageOptions {
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        std::env::var(DATA_DIR_ENV)
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join("books.json")
    }

    pub fn csv_path(&self) -> PathBuf {
        self.csv
            .clone()
            .unwrap_or_else(|| self.data_dir().join("books_data.csv"))
    }
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub crawl: CrawlOptions,

    #[command(flatten)]
    pub storage: StorageOptions,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub storage: StorageOptions,
}
