use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;

use crate::formats::{Book, BookRecord, CategoryStats, Rating, StatsOverview, StoreSnapshot};

/// Book records persisted as a single JSON snapshot and served from memory.
#[derive(Debug, Clone)]
pub struct BookStore {
    path: PathBuf,
    snapshot: StoreSnapshot,
}

impl BookStore {
    /// Loads the snapshot at `path`, creating an empty one if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let snapshot = match read_json(&path).with_context(|| format!("read: {}", path.display()))? {
            Some(snapshot) => snapshot,
            None => {
                let empty = StoreSnapshot {
                    populated_at: None,
                    books: Vec::new(),
                };
                write_json_atomic(&path, &empty).context("write empty store")?;
                empty
            }
        };
        Ok(Self { path, snapshot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn populated_at(&self) -> Option<&str> {
        self.snapshot.populated_at.as_deref()
    }

    /// Discards the current contents and stores `records` with ids `1..=n` in input order.
    ///
    /// The file is replaced with a rename, so readers never see a partial snapshot.
    pub fn replace_all(&mut self, records: Vec<BookRecord>) -> anyhow::Result<()> {
        let books = records
            .into_iter()
            .zip(1_u64..)
            .map(|(record, id)| Book { id, record })
            .collect();
        let snapshot = StoreSnapshot {
            populated_at: Some(Utc::now().to_rfc3339()),
            books,
        };
        write_json_atomic(&self.path, &snapshot).context("write store")?;
        self.snapshot = snapshot;
        Ok(())
    }

    /// Checks that the backing file is still readable.
    pub fn ping(&self) -> anyhow::Result<()> {
        std::fs::File::open(&self.path)
            .with_context(|| format!("open: {}", self.path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshot.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.books.is_empty()
    }

    pub fn get_all(&self) -> &[Book] {
        &self.snapshot.books
    }

    pub fn get_by_id(&self, id: u64) -> Option<&Book> {
        self.snapshot.books.iter().find(|book| book.id == id)
    }

    /// Case-insensitive substring match on title and on category, combined with AND.
    /// Empty or missing filters match everything.
    pub fn search(&self, title: Option<&str>, category: Option<&str>) -> Vec<Book> {
        let title = normalized_filter(title);
        let category = normalized_filter(category);

        self.snapshot
            .books
            .iter()
            .filter(|book| {
                title
                    .as_deref()
                    .is_none_or(|needle| book.record.title.to_lowercase().contains(needle))
            })
            .filter(|book| {
                category
                    .as_deref()
                    .is_none_or(|needle| book.record.category.to_lowercase().contains(needle))
            })
            .cloned()
            .collect()
    }

    pub fn list_categories(&self) -> Vec<String> {
        self.snapshot
            .books
            .iter()
            .map(|book| book.record.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn filter_top_rated(&self) -> Vec<Book> {
        self.snapshot
            .books
            .iter()
            .filter(|book| book.record.rating == Some(Rating::Five))
            .cloned()
            .collect()
    }

    /// Inclusive on both ends; `min` defaults to 0 and `max` to unbounded.
    pub fn filter_by_price_range(&self, min: Option<f64>, max: Option<f64>) -> Vec<Book> {
        let min = min.unwrap_or(0.0);
        let max = max.unwrap_or(f64::INFINITY);
        self.snapshot
            .books
            .iter()
            .filter(|book| book.record.price >= min && book.record.price <= max)
            .cloned()
            .collect()
    }

    pub fn stats_overview(&self) -> StatsOverview {
        let books = &self.snapshot.books;
        let mut rating_distribution = BTreeMap::new();
        for rating in books.iter().filter_map(|book| book.record.rating) {
            *rating_distribution.entry(rating).or_insert(0) += 1;
        }

        StatsOverview {
            count: books.len(),
            average_price: average_price(books.iter().map(|book| book.record.price)),
            rating_distribution,
        }
    }

    pub fn stats_by_category(&self) -> BTreeMap<String, CategoryStats> {
        let mut prices: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for book in &self.snapshot.books {
            prices
                .entry(book.record.category.as_str())
                .or_default()
                .push(book.record.price);
        }

        prices
            .into_iter()
            .map(|(category, prices)| {
                let stats = CategoryStats {
                    count: prices.len(),
                    average_price: average_price(prices.into_iter()),
                };
                (category.to_owned(), stats)
            })
            .collect()
    }
}

fn normalized_filter(filter: Option<&str>) -> Option<String> {
    filter
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

/// Mean rounded to two decimals; 0 for an empty input.
fn average_price(prices: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = prices.fold((0.0, 0_usize), |(sum, count), price| (sum + price, count + 1));
    if count == 0 {
        return 0.0;
    }
    round2(sum / count as f64)
}

/// Rounds the exact binary value to two decimals, ties to even, like Python's `round(x, 2)`.
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let value = serde_json::from_slice(&bytes).context("parse json")?;
    Ok(Some(value))
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent dir: {}", parent.display()))?;
    }

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    let data = serde_json::to_vec_pretty(value).context("serialize json")?;
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
