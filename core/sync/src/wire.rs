//! Request and response shapes of the remote table API.
//!
//! A push is a single `Add` action carrying one row whose column names match
//! the remote sheet exactly. Replies are interpreted conservatively: only a
//! non-empty row list counts as success, because the remote answers `200 OK`
//! with an empty list when it silently refuses a row.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use coopledger_common::{Error, RemoteRowId, Result};
use coopledger_ledger::Record;

/// Action name for appending rows.
pub const ADD_ACTION: &str = "Add";

/// Longest slice of a raw body quoted in an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Body of a table action request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionRequest<'a> {
    pub action: &'a str,
    pub properties: ActionProperties<'a>,
    pub rows: Vec<RowPayload<'a>>,
}

/// Parsing hints sent alongside the rows.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionProperties<'a> {
    pub locale: &'a str,
    pub timezone: &'a str,
}

/// One record as a remote row.
#[derive(Debug, PartialEq, Serialize)]
pub struct RowPayload<'a> {
    #[serde(rename = "ID")]
    pub id: &'a str,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "BirdCount")]
    pub bird_count: u32,
    #[serde(rename = "TotalEggs")]
    pub total_eggs: u32,
    #[serde(rename = "BrokenEggs")]
    pub broken_eggs: u32,
    #[serde(rename = "FeedAM")]
    pub feed_morning: f64,
    #[serde(rename = "FeedPM")]
    pub feed_evening: f64,
    #[serde(rename = "Responsible")]
    pub responsible: &'a str,
    #[serde(rename = "Notes")]
    pub notes: &'a str,
    #[serde(rename = "PostureRate")]
    pub posture_rate: f64,
    #[serde(rename = "LossRate")]
    pub loss_rate: f64,
    #[serde(rename = "TotalFeed")]
    pub total_feed: f64,
}

impl<'a> RowPayload<'a> {
    /// Map a record to its row. Derived values are rounded to 2 decimal places.
    pub fn from_record(record: &'a Record) -> Self {
        Self {
            id: record.id().as_str(),
            date: record.date().to_string(),
            bird_count: record.bird_count(),
            total_eggs: record.total_eggs(),
            broken_eggs: record.broken_eggs(),
            feed_morning: record.feed_morning(),
            feed_evening: record.feed_evening(),
            responsible: record.responsible(),
            notes: record.notes(),
            posture_rate: round2(record.posture_rate()),
            loss_rate: round2(record.loss_rate()),
            total_feed: round2(record.total_feed()),
        }
    }
}

impl<'a> ActionRequest<'a> {
    /// An `Add` action for a single record.
    pub fn add(record: &'a Record, locale: &'a str, timezone: &'a str) -> Self {
        Self {
            action: ADD_ACTION,
            properties: ActionProperties { locale, timezone },
            rows: vec![RowPayload::from_record(record)],
        }
    }
}

/// Decide whether a reply confirms that the row was written.
///
/// `fallback_id` is used when the returned row carries no identifier.
///
/// # Errors
/// - `Sync` when the status is not 2xx, the body carries an error field,
///   the body is not JSON, or the returned row list is missing or empty
pub fn interpret_response(status: StatusCode, body: &str, fallback_id: &str) -> Result<RemoteRowId> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !status.is_success() {
        let detail = parsed
            .as_ref()
            .and_then(error_message)
            .unwrap_or_else(|| excerpt(body));
        return Err(Error::Sync(format!("HTTP {}: {}", status.as_u16(), detail)));
    }

    let Some(value) = parsed else {
        return Err(Error::Sync(format!(
            "Remote replied with a non-JSON body: {}",
            excerpt(body)
        )));
    };

    if let Some(message) = error_message(&value) {
        return Err(Error::Sync(format!("Remote rejected the row: {}", message)));
    }

    let rows = match &value {
        Value::Array(rows) => rows,
        Value::Object(map) => match map.get("Rows") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(Error::Sync("Remote reply has no row list".to_string())),
        },
        _ => return Err(Error::Sync("Remote reply has no row list".to_string())),
    };

    let Some(first) = rows.first() else {
        return Err(Error::Sync(
            "Remote returned no rows: check that the table columns match \
             ID, Date, BirdCount, TotalEggs, BrokenEggs, FeedAM, FeedPM, Responsible, \
             Notes, PostureRate, LossRate, TotalFeed and that the ID is not already present"
                .to_string(),
        ));
    };

    Ok(row_id(first).unwrap_or_else(|| RemoteRowId::new(fallback_id)))
}

/// Error text carried by a reply object, if any.
fn error_message(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    ["RestApiResponse", "Error"]
        .iter()
        .filter_map(|field| map.get(*field))
        .find_map(|v| match v {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
}

fn row_id(row: &Value) -> Option<RemoteRowId> {
    ["_RowNumber", "ID"]
        .iter()
        .filter_map(|field| row.get(*field))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(RemoteRowId::new(s.as_str())),
            Value::Number(n) => Some(RemoteRowId::new(n.to_string())),
            _ => None,
        })
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_BODY_EXCERPT).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> Result<RemoteRowId> {
        interpret_response(StatusCode::OK, body, "local-1")
    }

    #[test]
    fn test_row_list_is_success() {
        let id = ok(r#"[{"_RowNumber": 12, "ID": "local-1"}]"#).unwrap();
        assert_eq!(id.as_str(), "12");
    }

    #[test]
    fn test_rows_object_is_success() {
        let id = ok(r#"{"Rows": [{"ID": "abc"}]}"#).unwrap();
        assert_eq!(id.as_str(), "abc");
    }

    #[test]
    fn test_row_without_id_uses_fallback() {
        let id = ok(r#"[{"Date": "2024-05-01"}]"#).unwrap();
        assert_eq!(id.as_str(), "local-1");
    }

    #[test]
    fn test_empty_list_is_failure() {
        let err = ok("[]").unwrap_err();
        assert!(matches!(err, Error::Sync(ref msg) if msg.contains("no rows")));

        assert!(ok(r#"{"Rows": []}"#).is_err());
    }

    #[test]
    fn test_error_field_is_failure_even_with_200() {
        let err = ok(r#"{"RestApiResponse": "Table not found"}"#).unwrap_err();
        assert!(err.to_string().contains("Table not found"));

        assert!(ok(r#"{"Error": {"code": 7}, "Rows": [{"ID": "x"}]}"#).is_err());
    }

    #[test]
    fn test_null_error_field_is_ignored() {
        assert!(ok(r#"{"Error": null, "Rows": [{"ID": "x"}]}"#).is_ok());
    }

    #[test]
    fn test_http_error_carries_status_and_detail() {
        let err = interpret_response(
            StatusCode::FORBIDDEN,
            r#"{"Error": "Invalid access key"}"#,
            "local-1",
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("Invalid access key"));

        let err = interpret_response(StatusCode::INTERNAL_SERVER_ERROR, "", "local-1").unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_non_json_success_is_failure() {
        assert!(ok("<html>ok</html>").is_err());
        assert!(ok("").is_err());
        assert!(ok("42").is_err());
    }
}
