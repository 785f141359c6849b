pub mod calorizator;
pub mod collect;
pub mod fetch;

use crate::error::Result;
use crate::models::Product;
use crate::settings::{SourceConfig, SourceKind};

use calorizator::Calorizator;

/// The site adapter chosen for this run.
pub enum Source {
    Calorizator(Calorizator),
}

impl Source {
    pub fn from_config(cfg: &SourceConfig) -> Result<Self> {
        match cfg.name {
            SourceKind::Calorizator => Ok(Source::Calorizator(Calorizator::new(cfg)?)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Source::Calorizator(_) => calorizator::NAME,
        }
    }

    pub async fn parse(&self) -> Result<Vec<Product>> {
        match self {
            Source::Calorizator(c) => c.parse().await,
        }
    }
}
