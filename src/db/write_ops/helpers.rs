#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::LucidError;

const SENSITIVE_KEYS: [&str; 6] = [
    "token",
    "password",
    "secret",
    "key",
    "authorization",
    "database_url",
];

#[allow(clippy::expect_used)]
static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("token pattern"));

/// Coarse bucket for a failure message, used in logs next to the redacted text.
#[must_use]
pub fn classify_failure_category(message: &str) -> &'static str {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("timed out") || lowered.contains("timeout") {
        "timeout"
    } else if lowered.contains("http") && lowered.contains("status") {
        "provider_http"
    } else if lowered.contains("malformed") || lowered.contains("decode") {
        "malformed_response"
    } else if lowered.contains("storage") || lowered.contains("object") {
        "storage"
    } else {
        "execution_failure"
    }
}

/// Masks `key=value` secrets and bearer tokens token-by-token. Whitespace between tokens
/// is kept as written.
#[must_use]
pub fn redact_sensitive(message: &str) -> String {
    let mut redact_next = false;
    TOKEN
        .replace_all(message, |caps: &Captures<'_>| {
            let token = &caps[0];
            if redact_next {
                redact_next = false;
                return "<redacted>".to_string();
            }
            redact_next = token.eq_ignore_ascii_case("bearer");
            redact_token(token)
        })
        .into_owned()
}

fn redact_token(token: &str) -> String {
    token.split_once('=').map_or_else(
        || token.to_string(),
        |(key, _)| {
            let normalized = key.to_ascii_lowercase();
            if SENSITIVE_KEYS
                .iter()
                .any(|sensitive| normalized.contains(sensitive))
            {
                format!("{key}=<redacted>")
            } else {
                token.to_string()
            }
        },
    )
}

pub(crate) fn not_found(entity: &str, id: i64) -> LucidError {
    LucidError::NotFound(format!("{entity} {id} not found"))
}

/// Unique-constraint hits become validation errors; anything else is a database error.
pub(crate) fn map_insert_error(e: sqlx::Error, what: &str, duplicate: &str) -> LucidError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            LucidError::Validation(duplicate.to_string())
        }
        _ => LucidError::DatabaseError(format!("Failed to insert {what}: {e}")),
    }
}
