pub mod sqlite;

use crate::error::Result;
use crate::models::Product;
use crate::settings::{DbConfig, StoreKind};

use sqlite::Sqlite;

/// What a full-replace load wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub statements: usize,
    pub rows: usize,
}

/// Destination backend, picked from `db.name`. Opening creates the product
/// table if it does not exist yet.
pub enum Store {
    Sqlite(Sqlite),
}

impl Store {
    pub fn open(cfg: &DbConfig) -> Result<Self> {
        match cfg.name {
            StoreKind::Sqlite => Ok(Store::Sqlite(Sqlite::open(&cfg.path, cfg.batch_size)?)),
        }
    }

    /// Truncate-then-load in a single transaction.
    pub fn insert_products(&self, products: &[Product]) -> Result<LoadStats> {
        match self {
            Store::Sqlite(db) => db.insert_products(products),
        }
    }

    pub fn insert_product(&self, product: &Product) -> Result<()> {
        match self {
            Store::Sqlite(db) => db.insert_product(product),
        }
    }

    pub fn count(&self) -> Result<usize> {
        match self {
            Store::Sqlite(db) => db.count(),
        }
    }

    pub fn fetch_all(&self) -> Result<Vec<Product>> {
        match self {
            Store::Sqlite(db) => db.fetch_all(),
        }
    }

    pub fn close(self) -> Result<()> {
        match self {
            Store::Sqlite(db) => db.close(),
        }
    }
}
