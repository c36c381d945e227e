//! Read contract over the at-rest record layout.
//!
//! Each section is a table keyed by the enciphered patient identifier in
//! its `patient_id` column. Every text-typed field is independently
//! enciphered; numeric missing values are stored as `-1` and text missing
//! values as the enciphered `"Data Unknown"` sentinel. This module //! reads; ingestion is a separate concern.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::ValueRef;
use rusqlite::Connection;

use super::StoreError;
use crate::models::{FieldValue, RawRow};

/// Abstract read access to the record store. The sole operations the
/// retrieval core needs: enumerate sections, read one section's rows for
/// an enciphered patient identifier, in insertion order.
pub trait RecordStore {
    fn section_names(&self) -> Result<Vec<String>, StoreError>;

    fn read_section(
        &self,
        section: &str,
        encrypted_patient_id: &str,
    ) -> Result<Vec<RawRow>, StoreError>;
}

/// SQLite-backed record store. Every user table is a section; a table
/// without a `patient_id` column belongs to no patient and yields no rows.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open a store backed by a database file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open an in-memory store (for testing).
    pub fn open_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection (lets tests seed data first).
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn columns(conn: &Connection, table: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cols)
    }
}

/// Section names are interpolated into SQL (SQLite cannot parameterize
/// identifiers), so only plain identifiers are accepted.
fn validate_section_name(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if head_ok && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(StoreError::InvalidSectionName(name.to_string()))
    }
}

fn value_from_sql(value: ValueRef<'_>, column: &str) -> FieldValue {
    match value {
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => FieldValue::Text(s.to_string()),
            Err(_) => {
                tracing::warn!(column, "Non-UTF-8 text value, treating as null");
                FieldValue::Null
            }
        },
        ValueRef::Integer(n) => FieldValue::Number(n as f64),
        ValueRef::Real(n) => FieldValue::Number(n),
        ValueRef::Null => FieldValue::Null,
        ValueRef::Blob(_) => {
            tracing::warn!(column, "Unexpected blob value, treating as null");
            FieldValue::Null
        }
    }
}

impl RecordStore for SqliteRecordStore {
    fn section_names(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type='table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn read_section(
        &self,
        section: &str,
        encrypted_patient_id: &str,
    ) -> Result<Vec<RawRow>, StoreError> {
        validate_section_name(section)?;
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;

        let columns = Self::columns(&conn, section)?;
        if !columns.iter().any(|c| c == "patient_id") {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {section} WHERE patient_id = ?1"
        ))?;
        let rows = stmt
            .query_map([encrypted_patient_id], |row| {
                let mut fields: RawRow = Vec::with_capacity(columns.len());
                for (i, name) in columns.iter().enumerate() {
                    fields.push((name.clone(), value_from_sql(row.get_ref(i)?, name)));
                }
                Ok(fields)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
