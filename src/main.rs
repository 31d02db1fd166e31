use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    bookscrape::logging::init().context("init logging")?;

    let cli = bookscrape::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        bookscrape::cli::Command::Crawl(args) => {
            // The crawler uses a blocking HTTP client.
            tokio::task::block_in_place(|| bookscrape::crawl::run(args)).context("crawl")?;
        }
        bookscrape::cli::Command::Import(args) => {
            bookscrape::import::run(args).context("import")?;
        }
    }

    Ok(())
}
