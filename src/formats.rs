use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Star rating as printed in the `star-rating <Word>` class of a listing item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rating {
    One,
    Two,
    Three,
    Four,
    Five,
}

impl Rating {
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::One => "One",
            Rating::Two => "Two",
            Rating::Three => "Three",
            Rating::Four => "Four",
            Rating::Five => "Five",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "One" => Ok(Rating::One),
            "Two" => Ok(Rating::Two),
            "Three" => Ok(Rating::Three),
            "Four" => Ok(Rating::Four),
            "Five" => Ok(Rating::Five),
            other => anyhow::bail!("unknown rating: {other}"),
        }
    }
}

/// One scraped book, before the store assigns it an id.
///
/// Field names on the wire match the export header and the API payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "preco")]
    pub price: f64,
    pub rating: Option<Rating>,
    #[serde(rename = "disponibilidade")]
    pub availability: String,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "imagem_url")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: u64,
    #[serde(flatten)]
    pub record: BookRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub populated_at: Option<String>,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsOverview {
    #[serde(rename = "total_de_livros")]
    pub count: usize,
    #[serde(rename = "preco_medio")]
    pub average_price: f64,
    #[serde(rename = "distribuicao_de_ratings")]
    pub rating_distribution: BTreeMap<Rating, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    #[serde(rename = "quantidade_de_livros")]
    pub count: usize,
    #[serde(rename = "preco_medio")]
    pub average_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub message: String,
    pub book_count: usize,
}
