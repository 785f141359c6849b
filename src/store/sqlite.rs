use std::path::Path;

use rusqlite::{Connection, ToSql};
use tracing::debug;

use super::LoadStats;
use crate::error::{Error, Result};
use crate::models::Product;

const COLUMNS: usize = Product::COLUMNS.len();

pub struct Sqlite {
    conn: Connection,
    batch_size: usize,
}

impl Sqlite {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::storage("open"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(Error::storage("configure"))?;
        Self::with_connection(conn, batch_size)
    }

    #[cfg(test)]
    pub fn in_memory(batch_size: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::storage("open"))?;
        Self::with_connection(conn, batch_size)
    }

    fn with_connection(conn: Connection, batch_size: usize) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn, batch_size })
    }

    pub fn insert_product(&self, product: &Product) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO product(name, protein, fat, carbohydrate, kcal) VALUES ($1, $2, $3, $4, $5)",
                rusqlite::params![
                    product.name,
                    product.protein,
                    product.fat,
                    product.carbohydrate,
                    product.kcal,
                ],
            )
            .map_err(Error::storage("insert product"))?;
        Ok(())
    }

    /// Replace the whole table with `products` in one transaction.
    ///
    /// Rows go in as multi-row inserts of at most `batch_size` rows. Any
    /// failure drops the transaction uncommitted, which rolls back the
    /// truncate as well; after a successful `commit` there is nothing left to
    /// roll back.
    pub fn insert_products(&self, products: &[Product]) -> Result<LoadStats> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(Error::storage("begin transaction"))?;

        tx.execute("DELETE FROM product", [])
            .map_err(Error::storage("truncate"))?;

        let mut stats = LoadStats::default();
        let mut args: Vec<&dyn ToSql> =
            Vec::with_capacity(COLUMNS * self.batch_size.min(products.len()));

        for chunk in products.chunks(self.batch_size) {
            args.clear();
            for p in chunk {
                args.extend_from_slice(&[&p.name, &p.protein, &p.fat, &p.carbohydrate, &p.kcal]);
            }

            // Full chunks share one statement; only the tail chunk differs.
            let mut stmt = tx
                .prepare_cached(&new_insert_product_query(chunk.len()))
                .map_err(Error::storage("batch insert"))?;
            let rows = stmt
                .execute(args.as_slice())
                .map_err(Error::storage("batch insert"))?;

            stats.statements += 1;
            stats.rows += rows;
            debug!(batch = stats.statements, rows, "inserted batch");
        }

        tx.commit().map_err(Error::storage("commit"))?;
        Ok(stats)
    }

    pub fn count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM product", [], |r| r.get(0))
            .map_err(Error::storage("count"))
    }

    pub fn fetch_all(&self) -> Result<Vec<Product>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, protein, fat, carbohydrate, kcal FROM product ORDER BY rowid")
            .map_err(Error::storage("select"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Product {
                    name: row.get(0)?,
                    protein: row.get(1)?,
                    fat: row.get(2)?,
                    carbohydrate: row.get(3)?,
                    kcal: row.get(4)?,
                })
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(Error::storage("select"))?;
        Ok(rows)
    }

    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, source)| Error::Storage { op: "close", source })
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS product (
            name         TEXT NOT NULL CHECK(name <> ''),
            protein      NUMERIC(8,2) NOT NULL DEFAULT 0,
            fat          NUMERIC(8,2) NOT NULL DEFAULT 0,
            carbohydrate NUMERIC(8,2) NOT NULL DEFAULT 0,
            kcal         INTEGER NOT NULL DEFAULT 0 CHECK(kcal >= 0)
        );
        ",
    )
    .map_err(Error::storage("create schema"))
}

/// `INSERT ... VALUES ($1,...,$5), ($6,...,$10), ...` for `rows` rows.
pub fn new_insert_product_query(rows: usize) -> String {
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let placeholders: Vec<String> = (1..=COLUMNS)
                .map(|col| format!("${}", row * COLUMNS + col))
                .collect();
            format!("({})", placeholders.join(","))
        })
        .collect();

    format!(
        "INSERT INTO product({}) VALUES {}",
        Product::COLUMNS.join(", "),
        tuples.join(", ")
    )
}
