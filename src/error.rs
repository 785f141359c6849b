use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a run can end with. Nothing here is retried: a scrape or
/// load either completes or surfaces one of these to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("page {page}: request to {url} failed: {source}")]
    Transport {
        page: usize,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("page {page}: could not read document from {url}: {message}")]
    Parse {
        page: usize,
        url: String,
        message: String,
    },

    #[error("page {page}: unexpected markup: {message}")]
    Structure { page: usize, message: String },

    #[error("page {page}, row {row}{}: invalid {field}: {message}", product_suffix(.product))]
    Validation {
        page: usize,
        row: usize,
        field: &'static str,
        product: Option<String>,
        message: String,
    },

    #[error("storage: {op} failed: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("collector stopped: {0}")]
    Collector(String),

    #[error("config: {0}")]
    Config(String),
}

fn product_suffix(product: &Option<String>) -> String {
    match product {
        Some(name) => format!(" ({})", name),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn storage(op: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
        move |source| Error::Storage { op, source }
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}
