//! SQLite catalog source.
//!
//! Reads the `dishes` and `wines` tables of an externally managed catalog
//! database. Nested lists live in JSON text columns. The wine table may come
//! from either schema generation (`main_flavors` or a flat `flavors` list).

use super::{CatalogRecord, CatalogSource, DishRow, IngredientRow, MainFlavorRow, WineRow};
use crate::error::{Result, SavorError};
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// Catalog source backed by a SQLite database.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open an existing catalog database read-only.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SavorError::SourceUnavailable(format!(
                "Catalog database not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| SavorError::SourceUnavailable(e.to_string()))?;

        info!("Opened catalog database at {:?}", path);
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn columns(conn: &Connection, table: &str) -> rusqlite::Result<HashSet<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect()
    }

    fn parse_json<T: serde::de::DeserializeOwned>(
        table: &str,
        id: i64,
        column: &str,
        raw: Option<String>,
    ) -> Result<Option<T>> {
        match raw {
            Some(text) if !text.trim().is_empty() => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| {
                    SavorError::SourceUnavailable(format!(
                        "Malformed {} in {} row {}: {}",
                        column, table, id, e
                    ))
                }),
            _ => Ok(None),
        }
    }

    fn read_dishes(conn: &Connection) -> Result<Vec<CatalogRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, story, price, in_stock, ingredients FROM dishes ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<bool>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, name, story, price, in_stock, ingredients) = row?;
            let ingredients: Option<Vec<IngredientRow>> =
                Self::parse_json("dishes", id, "ingredients", ingredients)?;

            records.push(CatalogRecord::Dish(
                DishRow {
                    id,
                    name,
                    story,
                    price,
                    in_stock: in_stock.unwrap_or(true),
                    ingredients,
                }
                .into(),
            ));
        }
        Ok(records)
    }

    fn read_wines(conn: &Connection) -> Result<Vec<CatalogRecord>> {
        let columns = Self::columns(conn, "wines")?;
        let flavor_column = |name: &str| {
            if columns.contains(name) {
                name.to_string()
            } else {
                "NULL".to_string()
            }
        };

        let sql = format!(
            "SELECT id, name, story, price, in_stock, {}, {} FROM wines ORDER BY id",
            flavor_column("main_flavors"),
            flavor_column("flavors")
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<bool>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, name, story, price, in_stock, main_flavors, flavors) = row?;
            let main_flavors: Option<Vec<MainFlavorRow>> =
                Self::parse_json("wines", id, "main_flavors", main_flavors)?;
            let flavors: Option<Vec<String>> = Self::parse_json("wines", id, "flavors", flavors)?;

            records.push(CatalogRecord::Wine(
                WineRow {
                    id,
                    name,
                    story,
                    price,
                    in_stock: in_stock.unwrap_or(true),
                    main_flavors,
                    flavors,
                }
                .into(),
            ));
        }
        Ok(records)
    }
}

#[async_trait]
impl CatalogSource for SqliteCatalog {
    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Vec<CatalogRecord>> {
        let conn = self.conn.lock().map_err(|e| {
            SavorError::SourceUnavailable(format!("Failed to acquire lock: {}", e))
        })?;

        let unavailable = |e: SavorError| match e {
            SavorError::SourceUnavailable(_) => e,
            other => SavorError::SourceUnavailable(other.to_string()),
        };

        let mut records = Self::read_dishes(&conn).map_err(unavailable)?;
        records.extend(Self::read_wines(&conn).map_err(unavailable)?);

        debug!("Fetched {} catalog records", records.len());
        Ok(records)
    }
}
