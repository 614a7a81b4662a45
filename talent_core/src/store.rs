//! Persisted table slot
//!
//! The last successfully loaded table is mirrored into a single SQLite table
//! named `talent_data`. Every save replaces the slot; there is no versioning.

use crate::error::{QueryError, Result};
use crate::table::{Column, Table, Value};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

pub const TABLE_SLOT: &str = "talent_data";

pub trait TableStore: Send {
    fn exists(&self) -> Result<bool>;
    fn save(&self, table: &Table) -> Result<()>;
    fn load(&self) -> Result<Table>;
}

pub struct SqliteTableStore {
    db: Mutex<Connection>,
}

impl SqliteTableStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("opened table store at {}", path.as_ref().display());
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            db: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Number(n) => SqlValue::Real(*n),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Missing => SqlValue::Null,
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Missing,
        SqlValue::Integer(i) => Value::Number(i as f64),
        SqlValue::Real(f) => Value::Number(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}

impl TableStore for SqliteTableStore {
    fn exists(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE_SLOT],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn save(&self, table: &Table) -> Result<()> {
        if table.width() == 0 {
            return Err(QueryError::Store("cannot store a table without columns".to_string()));
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let slot = quote_ident(TABLE_SLOT);
        tx.execute(&format!("DROP TABLE IF EXISTS {}", slot), [])?;

        let column_defs: Vec<String> = table
            .column_names()
            .iter()
            .map(|n| quote_ident(n))
            .collect();
        tx.execute(
            &format!("CREATE TABLE {} ({})", slot, column_defs.join(", ")),
            [],
        )?;

        let placeholders: Vec<String> = (1..=table.width()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            slot,
            column_defs.join(", "),
            placeholders.join(", ")
        );
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in 0..table.row_count() {
                let values = table.row(row).into_iter().map(to_sql);
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        info!("saved {} rows to {}", table.row_count(), TABLE_SLOT);
        Ok(())
    }

    fn load(&self) -> Result<Table> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(TABLE_SLOT)))
            .map_err(|e| QueryError::Store(format!("no stored table: {}", e)))?;

        let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let width = names.len();
        let mut cells: Vec<Vec<Value>> = vec![Vec::new(); width];

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, column) in cells.iter_mut().enumerate() {
                let value: SqlValue = row.get(i)?;
                column.push(from_sql(value));
            }
        }

        let columns = names
            .into_iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name, values))
            .collect();
        Table::new(columns)
    }
}
