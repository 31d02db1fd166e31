use anyhow::Context as _;

use crate::cli::ImportArgs;
use crate::store::BookStore;

/// Replaces the store contents with the rows of a CSV export.
pub fn run(args: ImportArgs) -> anyhow::Result<()> {
    let csv_path = args.storage.csv_path();
    let store_path = args.storage.store_path();

    let books = crate::export::read_csv(&csv_path).context("read csv export")?;
    let mut store = BookStore::open(&store_path).context("open book store")?;
    store.replace_all(books).context("populate book store")?;

    tracing::info!(
        csv = %csv_path.display(),
        store = %store_path.display(),
        books = store.len(),
        "imported csv into store"
    );
    Ok(())
}
