//! CSV email import — turns an uploaded contact sheet into the `csvEmails`
//! list of a `csv` segment filter.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

#[derive(Debug, Error)]
pub enum CsvImportError {
    #[error("malformed csv: {0}")]
    Malformed(#[from] csv::Error),
}

/// Result of an import: the clean list plus how many rows were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailImport {
    pub emails: Vec<String>,
    pub skipped: usize,
}

/// Canonical form used for email matching.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Read emails from CSV text.
///
/// Takes the `email` column when the first row is a header naming one,
/// otherwise the first column of every row. Addresses are normalized,
/// invalid or blank entries are skipped, and duplicates keep their first
/// occurrence.
pub fn parse_email_csv(input: &str) -> Result<EmailImport, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());

    let mut column = 0;
    let mut seen = HashSet::new();
    let mut import = EmailImport::default();

    for (row, record) in reader.records().enumerate() {
        let record = record?;

        if row == 0 {
            if let Some(idx) = record
                .iter()
                .position(|field| field.eq_ignore_ascii_case("email"))
            {
                column = idx;
                continue;
            }
        }

        let Some(email) = record.get(column).map(normalize_email) else {
            import.skipped += 1;
            continue;
        };

        if !is_valid_email(&email) {
            import.skipped += 1;
            continue;
        }

        if seen.insert(email.clone()) {
            import.emails.push(email);
        } else {
            import.skipped += 1;
        }
    }

    debug!(
        imported = import.emails.len(),
        skipped = import.skipped,
        "Parsed email csv"
    );

    Ok(import)
}
