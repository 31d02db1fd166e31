use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::cli::{CrawlArgs, CrawlOptions};
use crate::error::CrawlError;
use crate::formats::{BookRecord, Rating};

const FIRST_PAGE: &str = "page-1.html";

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Site root, used to resolve image paths.
    pub base_url: Url,
    pub delay: Duration,
    pub timeout: Duration,
    pub max_pages: usize,
    pub user_agent: String,
}

impl CrawlConfig {
    pub fn from_options(options: &CrawlOptions) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(&options.base_url).context("parse --base-url")?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            anyhow::bail!("--base-url must be http/https: {base_url}");
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            delay: Duration::from_millis(options.delay_ms),
            timeout: Duration::from_secs(options.timeout_secs),
            max_pages: options.max_pages.max(1),
            user_agent: options.user_agent.clone(),
        })
    }

    /// Listing pages and detail links are relative to this URL.
    pub fn catalogue_url(&self) -> Result<Url, url::ParseError> {
        self.base_url.join("catalogue/")
    }
}

/// Summary fields of one `article.product_pod` on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub title: String,
    pub price: f64,
    pub rating: Option<Rating>,
    pub availability: String,
    pub detail_href: String,
    pub image_src: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingPage {
    pub items: Vec<ListingItem>,
    pub next_href: Option<String>,
}

struct Selectors {
    product: Selector,
    title_link: Selector,
    price: Selector,
    rating: Selector,
    availability: Selector,
    image: Selector,
    next_link: Selector,
    breadcrumb_link: Selector,
}

impl Selectors {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            product: selector("article.product_pod")?,
            title_link: selector("h3 a")?,
            price: selector("p.price_color")?,
            rating: selector("p.star-rating")?,
            availability: selector("p.availability")?,
            image: selector("img")?,
            next_link: selector("li.next a")?,
            breadcrumb_link: selector("ul.breadcrumb a")?,
        })
    }

    fn listing(&self, html: &Html, url: &str) -> Result<ListingPage, CrawlError> {
        let mut items = Vec::new();
        for product in html.select(&self.product) {
            items.push(self.listing_item(product, url)?);
        }

        let next_href = html
            .select(&self.next_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_owned);

        Ok(ListingPage { items, next_href })
    }

    fn listing_item(&self, product: ElementRef<'_>, url: &str) -> Result<ListingItem, CrawlError> {
        let link = product
            .select(&self.title_link)
            .next()
            .ok_or_else(|| CrawlError::extract(url, "title link"))?;
        let title = link
            .value()
            .attr("title")
            .map(str::to_owned)
            .unwrap_or_else(|| element_text(link));
        let detail_href = link
            .value()
            .attr("href")
            .ok_or_else(|| CrawlError::extract(url, "detail link"))?
            .to_owned();

        let price = product
            .select(&self.price)
            .next()
            .map(element_text)
            .and_then(|text| parse_price(&text))
            .ok_or_else(|| CrawlError::extract(url, "price"))?;

        let rating = product
            .select(&self.rating)
            .next()
            .and_then(|p| p.value().classes().find_map(|class| class.parse::<Rating>().ok()));

        let availability = product
            .select(&self.availability)
            .next()
            .map(element_text)
            .unwrap_or_default();

        let image_src = product
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_owned);

        Ok(ListingItem {
            title,
            price,
            rating,
            availability,
            detail_href,
            image_src,
        })
    }

    /// The last breadcrumb link is the leaf category.
    fn category(&self, html: &Html, url: &str) -> Result<String, CrawlError> {
        html.select(&self.breadcrumb_link)
            .last()
            .map(element_text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| CrawlError::extract(url, "breadcrumb category"))
    }
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("invalid selector {css:?}: {err}"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_owned()
}

/// Parses the first run of digits and dots, skipping any currency prefix (`£51.77`).
pub fn parse_price(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let number: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}

/// Joins `href` onto `base` after dropping every `../` segment.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, url::ParseError> {
    base.join(&href.replace("../", ""))
}

pub struct Crawler {
    client: reqwest::blocking::Client,
    config: CrawlConfig,
    selectors: Selectors,
}

impl Crawler {
    pub fn new(config: CrawlConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("build crawl http client")?;

        Ok(Self {
            client,
            config,
            selectors: Selectors::new()?,
        })
    }

    /// Walks the listing pages in order, following the "next" control until it disappears.
    ///
    /// Every item costs one extra request to its detail page, which is the only place the
    /// category is shown. The first failed request or unparseable page aborts the crawl.
    pub fn crawl(&self) -> Result<Vec<BookRecord>, CrawlError> {
        let catalogue = self.config.catalogue_url()?;
        let mut next_url = Some(catalogue.join(FIRST_PAGE)?);
        let mut pages = 0_usize;
        let mut books = Vec::new();

        while let Some(page_url) = next_url.take() {
            if pages >= self.config.max_pages {
                tracing::warn!(
                    max_pages = self.config.max_pages,
                    next = %page_url,
                    "page limit reached; stopping crawl"
                );
                break;
            }
            pages += 1;

            let html = self.fetch_html(&page_url)?;
            let listing = self.selectors.listing(&html, page_url.as_str())?;
            tracing::info!(url = %page_url, items = listing.items.len(), "listing page");

            for item in listing.items {
                books.push(self.enrich(&catalogue, item)?);
                if !self.config.delay.is_zero() {
                    std::thread::sleep(self.config.delay);
                }
            }

            next_url = listing
                .next_href
                .map(|href| page_url.join(&href))
                .transpose()?;
        }

        tracing::info!(books = books.len(), pages, "crawl finished");
        Ok(books)
    }

    fn enrich(&self, catalogue: &Url, item: ListingItem) -> Result<BookRecord, CrawlError> {
        let detail_url = resolve_link(catalogue, &item.detail_href)?;
        let detail = self.fetch_html(&detail_url)?;
        let category = self.selectors.category(&detail, detail_url.as_str())?;
        tracing::debug!(url = %detail_url, %category, "detail page");

        let image_url = item
            .image_src
            .as_deref()
            .map(|src| resolve_link(&self.config.base_url, src))
            .transpose()?
            .map(String::from);

        Ok(BookRecord {
            title: item.title,
            price: item.price,
            rating: item.rating,
            availability: item.availability,
            category,
            image_url,
        })
    }

    fn fetch_html(&self, url: &Url) -> Result<Html, CrawlError> {
        let fetch_err = |source| CrawlError::UpstreamFetch {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::UpstreamStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let text = response.text().map_err(fetch_err)?;
        Ok(Html::parse_document(&text))
    }
}

/// Crawls the catalogue, writes the CSV export, then replaces the store contents.
///
/// Nothing is written unless the whole crawl succeeds.
pub fn run(args: CrawlArgs) -> anyhow::Result<()> {
    let config = CrawlConfig::from_options(&args.crawl)?;
    populate(
        &config,
        &args.storage.csv_path(),
        &args.storage.store_path(),
    )?;
    Ok(())
}

pub fn populate(config: &CrawlConfig, csv_path: &Path, store_path: &Path) -> anyhow::Result<usize> {
    tracing::info!(base_url = %config.base_url, "starting crawl");
    let crawler = Crawler::new(config.clone())?;
    let books = crawler.crawl().context("crawl catalogue")?;

    crate::export::write_csv(&books, csv_path).context("export csv")?;
    tracing::info!(path = %csv_path.display(), "wrote csv export");

    let mut store = crate::store::BookStore::open(store_path).context("open book store")?;
    store.replace_all(books).context("populate book store")?;
    tracing::info!(path = %store_path.display(), books = store.len(), "populated store");

    Ok(store.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<!doctype html>
<html><body>
<ol class="row">
  <li><article class="product_pod">
    <div class="image_container">
      <a href="a-light-in-the-attic_1000/index.html"><img src="../media/cache/2c/da/attic.jpg" alt="A Light in the Attic" class="thumbnail"></a>
    </div>
    <p class="star-rating Three"><i class="icon-star"></i></p>
    <h3><a href="a-light-in-the-attic_1000/index.html" title="A Light in the Attic">A Light in the ...</a></h3>
    <div class="product_price">
      <p class="price_color">£51.77</p>
      <p class="instock availability">
        <i class="icon-ok"></i>
        In stock
      </p>
    </div>
  </article></li>
  <li><article class="product_pod">
    <p class="star-rating"></p>
    <h3><a href="../../tipping-the-velvet_999/index.html" title="Tipping the Velvet">Tipping the ...</a></h3>
    <p class="price_color">Â£53.74</p>
  </article></li>
</ol>
<ul class="pager"><li class="current">Page 1 of 50</li><li class="next"><a href="page-2.html">next</a></li></ul>
</body></html>
"#;

    #[test]
    fn listing_page_extracts_summary_fields() -> anyhow::Result<()> {
        let selectors = Selectors::new()?;
        let html = Html::parse_document(LISTING);
        let page = selectors.listing(&html, "http://example.test/catalogue/page-1.html")?;

        assert_eq!(page.next_href.as_deref(), Some("page-2.html"));
        assert_eq!(page.items.len(), 2);

        let first = &page.items[0];
        assert_eq!(first.title, "A Light in the Attic");
        assert_eq!(first.price, 51.77);
        assert_eq!(first.rating, Some(Rating::Three));
        assert_eq!(first.availability, "In stock");
        assert_eq!(first.detail_href, "a-light-in-the-attic_1000/index.html");
        assert_eq!(
            first.image_src.as_deref(),
            Some("../media/cache/2c/da/attic.jpg")
        );

        let second = &page.items[1];
        assert_eq!(second.price, 53.74);
        assert_eq!(second.rating, None);
        assert_eq!(second.availability, "");
        assert_eq!(second.image_src, None);
        Ok(())
    }

    #[test]
    fn listing_without_next_control_has_no_next_href() -> anyhow::Result<()> {
        let selectors = Selectors::new()?;
        let html = Html::parse_document(
            r#"<html><body><ul class="pager"><li class="previous"><a href="page-1.html">previous</a></li></ul></body></html>"#,
        );
        let page = selectors.listing(&html, "http://example.test/catalogue/page-2.html")?;
        assert!(page.items.is_empty());
        assert_eq!(page.next_href, None);
        Ok(())
    }

    #[test]
    fn listing_item_without_price_is_an_extract_error() -> anyhow::Result<()> {
        let selectors = Selectors::new()?;
        let html = Html::parse_document(
            r#"<article class="product_pod"><h3><a href="x/index.html" title="X">X</a></h3></article>"#,
        );
        let err = selectors
            .listing(&html, "http://example.test/catalogue/page-1.html")
            .unwrap_err();
        assert!(matches!(err, CrawlError::Extract { field: "price", .. }));
        Ok(())
    }

    #[test]
    fn category_is_last_breadcrumb_link() -> anyhow::Result<()> {
        let selectors = Selectors::new()?;
        let html = Html::parse_document(
            r#"<ul class="breadcrumb">
                 <li><a href="../../index.html">Home</a></li>
                 <li><a href="../category/books_1/index.html">Books</a></li>
                 <li><a href="../category/books/poetry_23/index.html">Poetry</a></li>
                 <li class="active">A Light in the Attic</li>
               </ul>"#,
        );
        assert_eq!(selectors.category(&html, "detail")?, "Poetry");

        let empty = Html::parse_document("<p>no breadcrumb</p>");
        assert!(selectors.category(&empty, "detail").is_err());
        Ok(())
    }

    #[test]
    fn parse_price_strips_currency_prefix() {
        assert_eq!(parse_price("£51.77"), Some(51.77));
        assert_eq!(parse_price("Â£10.00"), Some(10.0));
        assert_eq!(parse_price(" 7 "), Some(7.0));
        assert_eq!(parse_price("free"), None);
    }

    #[test]
    fn resolve_link_neutralizes_parent_segments() -> anyhow::Result<()> {
        let root = Url::parse("https://books.toscrape.com/")?;
        let catalogue = root.join("catalogue/")?;

        assert_eq!(
            resolve_link(&root, "../media/cache/2c/da/attic.jpg")?.as_str(),
            "https://books.toscrape.com/media/cache/2c/da/attic.jpg"
        );
        assert_eq!(
            resolve_link(&catalogue, "../../tipping-the-velvet_999/index.html")?.as_str(),
            "https://books.toscrape.com/catalogue/tipping-the-velvet_999/index.html"
        );
        Ok(())
    }

    #[test]
    fn config_appends_trailing_slash_to_base_url() -> anyhow::Result<()> {
        let options = CrawlOptions {
            base_url: "http://127.0.0.1:9000/site".to_owned(),
            delay_ms: 0,
            timeout_secs: 5,
            max_pages: 0,
            user_agent: "test".to_owned(),
        };
        let config = CrawlConfig::from_options(&options)?;
        assert_eq!(
            config.catalogue_url()?.as_str(),
            "http://127.0.0.1:9000/site/catalogue/"
        );
        assert_eq!(config.max_pages, 1);
        Ok(())
    }

    #[test]
    fn config_rejects_non_http_base_url() {
        let options = CrawlOptions {
            base_url: "ftp://example.test/".to_owned(),
            delay_ms: 0,
            timeout_secs: 5,
            max_pages: 1,
            user_agent: "test".to_owned(),
        };
        assert!(CrawlConfig::from_options(&options).is_err());
    }
}
