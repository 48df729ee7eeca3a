// SPDX-FileCopyrightText: 2026 Laika Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers for turning vendor JSON into laika-object records.

use chrono::{DateTime, Utc};
use laika_core::{ObjectType, fields};
use serde_json::{Map, Value};

use crate::connector::Record;

/// Builds the `data` map of one record. Null and empty-string values are
/// left out so a vendor omitting a field does not churn the stored row.
pub struct RecordBuilder {
    object_type: ObjectType,
    data: Map<String, Value>,
}

impl RecordBuilder {
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert(fields::ID.to_string(), Value::String(id.into()));
        Self { object_type, data }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let empty = match &value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if !empty {
            self.data.insert(key.to_string(), value);
        }
        self
    }

    pub fn opt(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    pub fn build(self) -> Record {
        Record {
            object_type: self.object_type,
            data: self.data,
        }
    }
}

/// String at a JSON pointer (`/fields/status/name`). Numbers are stringified.
pub fn str_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse the timestamp shapes vendors send: RFC 3339, and Jira's
/// `2026-01-01T10:00:00.000+0000`.
pub fn parse_vendor_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Whether any of `timestamps` is strictly older than `since`.
/// Pulls sorted newest-first stop after the page where this turns true.
pub fn reached_since<'a>(
    since: Option<DateTime<Utc>>,
    timestamps: impl IntoIterator<Item = Option<&'a str>>,
) -> bool {
    let Some(since) = since else {
        return false;
    };
    timestamps
        .into_iter()
        .flatten()
        .filter_map(parse_vendor_ts)
        .any(|ts| ts < since)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn empty_fields_are_skipped() {
        let record = RecordBuilder::new(ObjectType::User, "u1")
            .field("Email", "a@x.com")
            .field("Title", "")
            .opt("Manager", None::<String>)
            .build();
        assert_eq!(record.data.len(), 2);
        assert_eq!(record.data["Id"], "u1");
    }

    #[test]
    fn pointers_stringify_numbers() {
        let v = json!({"a": {"b": 7, "c": "x"}});
        assert_eq!(str_at(&v, "/a/b").as_deref(), Some("7"));
        assert_eq!(str_at(&v, "/a/c").as_deref(), Some("x"));
        assert_eq!(str_at(&v, "/a/missing"), None);
    }

    #[test]
    fn jira_and_rfc3339_timestamps_parse() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_vendor_ts("2026-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_vendor_ts("2026-01-01T10:00:00.000+0000"), Some(expected));
        assert_eq!(parse_vendor_ts("yesterday"), None);
    }

    #[test]
    fn since_watermark_detection() {
        let since = Some(Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap());
        assert!(!reached_since(since, [Some("2026-01-03T00:00:00Z")]));
        assert!(reached_since(since, [Some("2026-01-03T00:00:00Z"), Some("2026-01-01T00:00:00Z")]));
        assert!(!reached_since(None, [Some("2000-01-01T00:00:00Z")]));
    }
}
