//! Form input helpers shared by the request handlers.
//!
//! Submissions arrive as loosely typed text, the way an HTML form posts them.
//! These helpers trim, coerce and collect per-field errors so a handler can
//! reject the whole submission before touching the store.

use bookshelf_http::error::AppError;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use time::{macros::format_description, Date, OffsetDateTime};

/// Describes one input of a form served by a `*/new` endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub kind: &'static str,
    pub required: bool,
}

impl FormField {
    pub const fn required(name: &'static str, kind: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Accumulates field errors of a single submission.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<Value>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, error: impl Into<String>) {
        self.0.push(json!({"field": field, "error": error.into()}));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok` when nothing was recorded, otherwise a validation error carrying
    /// every field error as details.
    pub fn finish(self, message: impl Into<String>) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(self.0, message))
        }
    }
}

/// Accept a JSON string or number as form text; `null` and absence are `None`.
pub fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected text or number, found {}",
            other
        ))),
    }
}

/// Trimmed, non-empty text or `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

/// Remove hyphens and spaces from a submitted ISBN.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect()
}

/// Parse an HTML date input value (`YYYY-MM-DD`).
pub fn parse_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
}

pub fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}
