//! Data Frames
//!
//! Column-oriented frames returned to the dashboard host, both as query
//! results and as streaming updates. A frame is a named list of equally
//! long fields, optionally carrying the live channel clients should
//! subscribe to for further updates.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::streaming::Payload;

/// Name given to every frame this datasource produces.
pub const RESPONSE_FRAME_NAME: &str = "response";

/// Column values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValues {
    /// Timestamps.
    Time(Vec<DateTime<Utc>>),
    /// 64-bit integers.
    Int64(Vec<i64>),
    /// Strings.
    String(Vec<String>),
}

impl FieldValues {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Time(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    /// Whether the column has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column values.
    pub values: FieldValues,
}

impl Field {
    /// Time column.
    #[must_use]
    pub fn time(name: impl Into<String>, values: Vec<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            values: FieldValues::Time(values),
        }
    }

    /// Integer column.
    #[must_use]
    pub fn int64(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            values: FieldValues::Int64(values),
        }
    }

    /// String column.
    #[must_use]
    pub fn string(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values: FieldValues::String(values),
        }
    }
}

/// Frame metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameMeta {
    /// Live channel that streams further updates for this frame.
    pub channel: String,
}

/// A named set of columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataFrame {
    /// Frame name.
    pub name: String,
    /// Columns.
    pub fields: Vec<Field>,
    /// Optional metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<FrameMeta>,
}

impl DataFrame {
    /// Create an empty frame.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            meta: None,
        }
    }

    /// Append a column.
    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Attach a live channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.meta = Some(FrameMeta {
            channel: channel.into(),
        });
        self
    }

    /// One-row streaming update built from an upstream payload: the receipt
    /// time and the payload text.
    #[must_use]
    pub fn stream_update(payload: &Payload) -> Self {
        Self::new(RESPONSE_FRAME_NAME)
            .with_field(Field::time("time", vec![payload.timestamp()]))
            .with_field(Field::string("values", vec![payload.to_text_lossy()]))
    }

    /// Number of rows (length of the first column).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.fields.first().map_or(0, |f| f.values.len())
    }

    /// Look up a column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_update_has_one_row() {
        let payload = Payload::new("{\"temp\":21}");
        let frame = DataFrame::stream_update(&payload);

        assert_eq!(frame.name, "response");
        assert_eq!(frame.rows(), 1);
        assert_eq!(
            frame.field("values").map(|f| &f.values),
            Some(&FieldValues::String(vec!["{\"temp\":21}".to_string()]))
        );
        assert_eq!(
            frame.field("time").map(|f| &f.values),
            Some(&FieldValues::Time(vec![payload.timestamp()]))
        );
        assert!(frame.meta.is_none());
    }

    #[test]
    fn serializes_meta_only_when_set() {
        let plain = serde_json::to_value(DataFrame::new("a")).unwrap();
        assert!(plain.get("meta").is_none());

        let with_channel =
            serde_json::to_value(DataFrame::new("a").with_channel("ds/x/stream")).unwrap();
        assert_eq!(with_channel["meta"]["channel"], "ds/x/stream");
    }

    #[test]
    fn field_values_serialize_as_arrays() {
        let frame = DataFrame::new("a").with_field(Field::int64("values", vec![10, 20]));
        let json = serde_json::to_value(frame).unwrap();
        assert_eq!(json["fields"][0]["name"], "values");
        assert_eq!(json["fields"][0]["values"], serde_json::json!([10, 20]));
    }

    #[test]
    fn empty_frame_has_no_rows() {
        assert_eq!(DataFrame::new("a").rows(), 0);
        assert!(FieldValues::Int64(vec![]).is_empty());
    }
}
