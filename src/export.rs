use std::path::Path;

use anyhow::Context as _;

use crate::formats::BookRecord;

pub const CSV_HEADER: [&str; 6] = [
    "titulo",
    "preco",
    "rating",
    "disponibilidade",
    "categoria",
    "imagem_url",
];

/// Writes `books` as comma-delimited text under a [`CSV_HEADER`] row.
///
/// Parent directories are created and an existing file is overwritten.
pub fn write_csv(books: &[BookRecord], out: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create export output dir: {}", parent.display()))?;
    }

    // The header is written explicitly so an empty export still carries it.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(out)
        .with_context(|| format!("open output: {}", out.display()))?;
    writer
        .write_record(CSV_HEADER)
        .context("write csv header")?;
    for book in books {
        writer
            .serialize(book)
            .with_context(|| format!("write row: {}", book.title))?;
    }
    writer
        .flush()
        .with_context(|| format!("flush output: {}", out.display()))?;

    Ok(())
}

pub fn read_csv(input: &Path) -> anyhow::Result<Vec<BookRecord>> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("open input: {}", input.display()))?;

    let mut books = Vec::new();
    for (idx, row) in reader.deserialize().enumerate() {
        // +2: header row and 1-based line numbers.
        let book: BookRecord = row.with_context(|| format!("parse csv line {}", idx + 2))?;
        books.push(book);
    }
    Ok(books)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Rating;

    fn book(title: &str, price: f64, rating: Option<Rating>, category: &str) -> BookRecord {
        BookRecord {
            title: title.to_owned(),
            price,
            rating,
            availability: "In stock".to_owned(),
            category: category.to_owned(),
            image_url: Some(format!("https://books.toscrape.com/media/{title}.jpg")),
        }
    }

    #[test]
    fn write_csv_emits_header_without_id() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("nested/dir/books.csv");

        write_csv(&[book("Sapiens", 54.23, Some(Rating::Five), "History")], &out)?;

        let text = std::fs::read_to_string(&out)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER.join(",").as_str()));
        assert_eq!(
            lines.next(),
            Some("Sapiens,54.23,Five,In stock,History,https://books.toscrape.com/media/Sapiens.jpg")
        );
        assert_eq!(lines.next(), None);
        Ok(())
    }

    #[test]
    fn export_then_import_preserves_records() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("books.csv");
        let books = vec![
            book("Sharp Objects", 47.82, Some(Rating::Four), "Mystery"),
            book("Quotes, \"Wit\" and Wisdom", 10.0, None, "Humor"),
            BookRecord {
                image_url: None,
                ..book("Olio", 23.88, Some(Rating::One), "Poetry")
            },
        ];

        write_csv(&books, &out)?;
        assert_eq!(read_csv(&out)?, books);
        Ok(())
    }

    #[test]
    fn write_csv_overwrites_existing_file() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("books.csv");
        std::fs::write(&out, "stale contents that are much longer than the new export\n")?;

        write_csv(&[], &out)?;
        assert!(read_csv(&out)?.is_empty());
        assert_eq!(
            std::fs::read_to_string(&out)?,
            "titulo,preco,rating,disponibilidade,categoria,imagem_url\n"
        );
        Ok(())
    }
}
