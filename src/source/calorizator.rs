use std::sync::LazyLock;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::collect::{emit, Collector};
use super::fetch::PageFetcher;
use crate::error::{Error, Result};
use crate::models::Product;
use crate::settings::SourceConfig;

pub const NAME: &str = "calorizator";

static ROW: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("#main-content tr.even, #main-content tr.odd").unwrap()
});

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".views-field-title a").unwrap());

static PAGER_LAST: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.pager-last a").unwrap());

static PROTEIN: LazyLock<Selector> = LazyLock::new(|| value_cell("protein"));
static FAT: LazyLock<Selector> = LazyLock::new(|| value_cell("fat"));
static CARBOHYDRATE: LazyLock<Selector> = LazyLock::new(|| value_cell("carbohydrate"));
static KCAL: LazyLock<Selector> = LazyLock::new(|| value_cell("kcal"));

fn value_cell(field: &str) -> Selector {
    Selector::parse(&format!(".views-field-field-{}-value", field)).unwrap()
}

/// Listing adapter for calorizator.ru's product table.
pub struct Calorizator {
    fetcher: PageFetcher,
    cfg: SourceConfig,
}

/// Where the page loop is. Any `?` out of `parse` is the failed state.
enum Phase {
    FetchingFirstPage,
    ResolvingCount(Html),
    Extracting { page: usize, doc: Html },
    Delaying { next: usize },
    Fetching { page: usize },
    Done,
}

impl Calorizator {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        Ok(Self {
            fetcher: PageFetcher::new(&cfg.url, cfg.timeout())?,
            cfg: cfg.clone(),
        })
    }

    /// Walk every listing page in order and return all products.
    ///
    /// Rows stream into a bounded collector while the next page is fetched.
    /// The first bad page or row aborts the run and nothing is returned.
    pub async fn parse(&self) -> Result<Vec<Product>> {
        let (tx, mut collector) = Collector::spawn(self.cfg.product_per_page);
        let mut page_count = 0;
        let mut progress = ProgressBar::hidden();
        let mut phase = Phase::FetchingFirstPage;

        loop {
            phase = match phase {
                Phase::FetchingFirstPage => Phase::ResolvingCount(self.fetcher.fetch(0).await?),
                Phase::ResolvingCount(doc) => {
                    page_count = resolve_page_count(&doc, self.fetcher.base())?;
                    info!(source = NAME, pages = page_count, "resolved page count");
                    progress = page_progress(page_count);
                    collector.expect(page_count.saturating_mul(self.cfg.product_per_page));
                    Phase::Extracting { page: 0, doc }
                }
                Phase::Extracting { page, doc } => {
                    let emitted = extract_page(&doc, page, &tx).await?;
                    if emitted == 0 {
                        warn!(page, "page has no product rows");
                    }
                    debug!(page, products = emitted, "extracted page");
                    progress.inc(1);
                    if page + 1 < page_count {
                        Phase::Delaying { next: page + 1 }
                    } else {
                        Phase::Done
                    }
                }
                Phase::Delaying { next } => {
                    tokio::time::sleep(self.cfg.delay()).await;
                    Phase::Fetching { page: next }
                }
                Phase::Fetching { page } => Phase::Extracting {
                    page,
                    doc: self.fetcher.fetch(page).await?,
                },
                Phase::Done => break,
            };
        }

        progress.finish_and_clear();
        let products = collector.finish(tx).await?;
        info!(source = NAME, pages = page_count, products = products.len(), "scrape complete");
        Ok(products)
    }
}

fn page_progress(pages: usize) -> ProgressBar {
    let pb = ProgressBar::new(pages as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec}, eta {eta})")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

async fn extract_page(doc: &Html, page: usize, tx: &mpsc::Sender<Product>) -> Result<usize> {
    let mut emitted = 0;
    for product in rows(doc, page) {
        emit(tx, product?).await?;
        emitted += 1;
    }
    Ok(emitted)
}

// ── Pagination ──

/// Total page count from the "last page" pager link: its `page` index + 1.
pub fn resolve_page_count(doc: &Html, base: &Url) -> Result<usize> {
    let structure = |message: String| Error::Structure { page: 0, message };

    let link = doc
        .select(&PAGER_LAST)
        .next()
        .ok_or_else(|| structure("no last-page link in pager".into()))?;
    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| structure("last-page link has no href".into()))?;
    let url = base
        .join(href)
        .map_err(|e| structure(format!("last-page href {:?}: {}", href, e)))?;
    let last = url
        .query_pairs()
        .find(|(key, _)| key == "page")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| structure(format!("last-page href {:?} has no page parameter", href)))?;
    let last: usize = last
        .trim()
        .parse()
        .map_err(|_| structure(format!("last-page index {:?} is not a number", last)))?;

    last.checked_add(1)
        .ok_or_else(|| structure(format!("last-page index {} out of range", last)))
}

// ── Rows ──

/// Products of one page in document order. Yields at most one error, after
/// which it is exhausted: rows below a malformed row are never read.
pub struct Rows<'a> {
    rows: scraper::html::Select<'a, 'static>,
    page: usize,
    index: usize,
    halted: bool,
}

pub fn rows(doc: &Html, page: usize) -> Rows<'_> {
    Rows {
        rows: doc.select(&ROW),
        page,
        index: 0,
        halted: false,
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Product>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        let row = self.rows.next()?;
        let index = self.index;
        self.index += 1;

        let product = parse_row(row, self.page, index);
        self.halted = product.is_err();
        Some(product)
    }
}

fn parse_row(row: ElementRef, page: usize, index: usize) -> Result<Product> {
    let name = cell_text(row, &TITLE);
    if name.is_empty() {
        return Err(Error::Validation {
            page,
            row: index,
            field: "name",
            product: None,
            message: "empty name".into(),
        });
    }

    let invalid = |field: &'static str, message: String| Error::Validation {
        page,
        row: index,
        field,
        product: Some(name.clone()),
        message,
    };
    let protein = decimal(row, &PROTEIN).map_err(|m| invalid("protein", m))?;
    let fat = decimal(row, &FAT).map_err(|m| invalid("fat", m))?;
    let carbohydrate = decimal(row, &CARBOHYDRATE).map_err(|m| invalid("carbohydrate", m))?;
    let kcal = integer(row, &KCAL).map_err(|m| invalid("kcal", m))?;

    Ok(Product {
        name,
        protein,
        fat,
        carbohydrate,
        kcal,
    })
}

fn cell_text(row: ElementRef, selector: &Selector) -> String {
    row.select(selector)
        .next()
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Empty cell means "not reported" and reads as zero.
fn decimal(row: ElementRef, selector: &Selector) -> std::result::Result<f64, String> {
    let raw = cell_text(row, selector);
    if raw.is_empty() {
        return Ok(0.0);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(format!("{:?} is not a non-negative number", raw)),
    }
}

fn integer(row: ElementRef, selector: &Selector) -> std::result::Result<i64, String> {
    let raw = cell_text(row, selector);
    if raw.is_empty() {
        return Ok(0);
    }
    match raw.parse::<i64>() {
        Ok(v) if v >= 0 => Ok(v),
        _ => Err(format!("{:?} is not a non-negative integer", raw)),
    }
}
