//! Shared data types for stored rows, assembled records, and retrieval results.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Sentinel stored for a missing text field.
pub const MISSING_TEXT: &str = "Data Unknown";

/// Sentinel stored for a missing numeric field.
pub const MISSING_NUMBER: f64 = -1.0;

/// Visible sentinel substituted when a single field fails to decrypt.
/// The row is kept; only the unreadable field is replaced.
pub const DECRYPT_ERROR_SENTINEL: &str = "Decryption Error";

/// A single stored column value as read from the record store.
///
/// SQLite INTEGER and REAL both map to `Number`; the at-rest layout
/// never stores blobs, so anything else maps to `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable rendering for passage serialization.
    /// Integral numbers render without a trailing `.0`.
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            FieldValue::Null => String::new(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Number(n) => serializer.serialize_f64(*n),
            FieldValue::Null => serializer.serialize_none(),
        }
    }
}

/// One row of stored data: column name → raw value, in column order.
pub type RawRow = Vec<(String, FieldValue)>;

/// A decrypted, normalized record belonging to one section of one patient.
///
/// Field order is insertion order and is preserved end-to-end: passage
/// serialization walks fields in this order, and ranking results align
/// with record positions through it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClinicalRecord {
    fields: Vec<(String, FieldValue)>,
}

impl ClinicalRecord {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for ClinicalRecord {
    /// Serializes as a JSON object preserving field insertion order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, FieldValue)> for ClinicalRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// One section's ordered record sequence for a single patient.
#[derive(Debug, Clone, Serialize)]
pub struct SectionRecords {
    pub name: String,
    pub records: Vec<ClinicalRecord>,
}

impl SectionRecords {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A passage that survived a ranking pass, with its similarity score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub section: String,
    pub passage: String,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_preserves_insertion_order() {
        let mut rec = ClinicalRecord::new();
        rec.push("zeta", FieldValue::Text("1".into()));
        rec.push("alpha", FieldValue::Text("2".into()));
        rec.push("mid", FieldValue::Number(3.0));

        let names: Vec<&str> = rec.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn record_serializes_in_insertion_order() {
        let mut rec = ClinicalRecord::new();
        rec.push("zeta", FieldValue::Text("z".into()));
        rec.push("alpha", FieldValue::Number(1.0));

        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"zeta":"z","alpha":1.0}"#);
    }

    #[test]
    fn get_finds_field_by_name() {
        let mut rec = ClinicalRecord::new();
        rec.push("status", FieldValue::Text("active".into()));
        assert_eq!(rec.get("status").and_then(|v| v.as_text()), Some("active"));
        assert!(rec.get("missing").is_none());
    }

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(FieldValue::Number(95.0).display(), "95");
        assert_eq!(FieldValue::Number(13.2).display(), "13.2");
        assert_eq!(FieldValue::Number(-1.0).display(), "-1");
    }

    #[test]
    fn null_displays_empty() {
        assert_eq!(FieldValue::Null.display(), "");
        assert!(FieldValue::Null.is_null());
    }
}
