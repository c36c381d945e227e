//! Turns raw stored rows into decrypted, normalized clinical records.
//!
//! Every text field that structurally looks like ciphertext gets a
//! decryption attempt. A field that fails to decrypt is replaced with a
//! visible sentinel, and the row survives with partial data rather than the
//! request failing wholesale. Decrypted text is then normalized: the PHI
//! masking boilerplate is stripped, whitespace collapsed, and date-tagged
//! fields reparsed to ISO-8601 where possible.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::crypto::FieldCodec;
use crate::models::{ClinicalRecord, FieldValue, RawRow, SectionRecords, DECRYPT_ERROR_SENTINEL};

/// Boilerplate disclosure appended to masked source data; carries no
/// clinical signal and would pollute the term statistics.
pub const PHI_MASKING_NOTICE: &str =
    "All dates have been shifted by a fixed per-patient offset for PHI masking \
     Accession numbers and numeric identifiers have been replaced by plausible \
     looking alternatives for PHI masking";

/// Field names whose values are date-typed and eligible for ISO-8601 reparse.
pub const DATE_FIELDS: &[&str] = &[
    "date",
    "date_of_birth",
    "date_of_death",
    "recent_encounter_date",
    "immunization_date",
    "order_date",
    "taken_date",
    "result_date",
    "start_date",
    "end_date",
    "orderset_sched_start",
];

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Datetime layouts accepted for reparse, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-only layouts accepted for reparse, tried in order.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%Y%m%d",
];

/// Assembles per-section record sequences for one patient.
pub struct RecordAssembler<'a> {
    codec: &'a FieldCodec,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(codec: &'a FieldCodec) -> Self {
        Self { codec }
    }

    /// Assemble one section's raw rows into ordered clinical records.
    /// Row order is preserved exactly.
    pub fn assemble_section(&self, name: &str, rows: Vec<RawRow>) -> SectionRecords {
        let records = rows
            .into_iter()
            .map(|row| self.assemble_row(name, row))
            .collect();
        SectionRecords {
            name: name.to_string(),
            records,
        }
    }

    fn assemble_row(&self, section: &str, row: RawRow) -> ClinicalRecord {
        row.into_iter()
            .map(|(field, value)| {
                let value = match value {
                    FieldValue::Text(text) => {
                        FieldValue::Text(self.restore_text(section, &field, text))
                    }
                    other => other,
                };
                (field, value)
            })
            .collect()
    }

    /// Decrypt (when the value sniffs as ciphertext) then normalize.
    /// Values that do not look like ciphertext pass through to
    /// normalization unchanged: no decryption attempt, no error.
    fn restore_text(&self, section: &str, field: &str, value: String) -> String {
        let plaintext = if FieldCodec::looks_like_ciphertext(&value) {
            match self.codec.decrypt(&value) {
                Ok(pt) => pt,
                Err(e) => {
                    tracing::warn!(section, field, error = %e,
                        "Field decryption failed, substituting sentinel");
                    return DECRYPT_ERROR_SENTINEL.to_string();
                }
            }
        } else {
            value
        };
        normalize_field(field, &plaintext)
    }
}

/// Strip boilerplate, collapse whitespace, and reparse date-tagged fields.
pub fn normalize_field(field: &str, value: &str) -> String {
    let stripped = value.replace(PHI_MASKING_NOTICE, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ").into_owned();
    if DATE_FIELDS.contains(&field) {
        if let Some(iso) = reparse_date(&collapsed) {
            return iso;
        }
    }
    collapsed
}

/// Attempt to reparse a date string into canonical ISO-8601.
/// Returns `None` for anything outside the accepted layouts; such
/// values pass through unchanged rather than erroring.
pub fn reparse_date(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d.format("%Y-%m-%d").to_string());
        }
    }
    None
}
