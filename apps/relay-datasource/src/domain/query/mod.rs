//! Ad-hoc Query Types
//!
//! Request and response types for dashboard queries. Every query is answered
//! with the same two-row sample frame: the requested time range echoed back
//! and the constant series `[10, 20]`. A query that asks for streaming also
//! gets the live channel address attached to its frame.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::frame::{DataFrame, Field, RESPONSE_FRAME_NAME};
use super::subscription::ChannelAddress;

/// Constant series returned for every query.
pub const SAMPLE_VALUES: [i64; 2] = [10, 20];

// =============================================================================
// Request Types
// =============================================================================

/// Absolute time range of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Range start.
    pub from: DateTime<Utc>,
    /// Range end.
    pub to: DateTime<Utc>,
}

/// A single query inside a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    /// Identifier the response is keyed by.
    pub ref_id: String,
    /// Requested time range.
    pub time_range: TimeRange,
    /// Remaining query fields as sent by the query editor.
    #[serde(flatten)]
    pub model: serde_json::Map<String, serde_json::Value>,
}

/// Batch of queries sent by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDataRequest {
    /// Queries to answer.
    #[serde(default)]
    pub queries: Vec<DataQuery>,
}

/// Query options understood by this datasource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryModel {
    /// Free text from the editor. Accepted but not interpreted.
    #[serde(default)]
    pub query_text: String,
    /// Whether the client wants live updates.
    #[serde(default)]
    pub with_streaming: bool,
}

impl QueryModel {
    /// Decode the model from a query's editor fields. Absent fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if a known field has the wrong type.
    pub fn from_fields(
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(fields.clone()))
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Result of one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataResponse {
    /// Frames produced by the query.
    pub frames: Vec<DataFrame>,
    /// Error message if the query could not be answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DataResponse {
    /// Failed response with no frames.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            frames: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// Results of a batch, keyed by `refId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryDataResponse {
    /// Per-query results.
    pub responses: BTreeMap<String, DataResponse>,
}

// =============================================================================
// Query Evaluation
// =============================================================================

/// Answer one query for the given datasource.
///
/// Pure: the same query always yields the same response.
#[must_use]
pub fn answer(query: &DataQuery, datasource_uid: &str) -> DataResponse {
    let model = match QueryModel::from_fields(&query.model) {
        Ok(model) => model,
        Err(e) => return DataResponse::error(format!("invalid query model: {e}")),
    };

    let mut frame = DataFrame::new(RESPONSE_FRAME_NAME)
        .with_field(Field::time(
            "time",
            vec![query.time_range.from, query.time_range.to],
        ))
        .with_field(Field::int64("values", SAMPLE_VALUES.to_vec()));

    if model.with_streaming {
        frame = frame.with_channel(ChannelAddress::for_datasource(datasource_uid).to_string());
    }

    DataResponse {
        frames: vec![frame],
        error: None,
    }
}

/// Answer every query of a batch.
#[must_use]
pub fn answer_all(request: &QueryDataRequest, datasource_uid: &str) -> QueryDataResponse {
    let responses = request
        .queries
        .iter()
        .map(|q| (q.ref_id.clone(), answer(q, datasource_uid)))
        .collect();

    QueryDataResponse { responses }
}

// =============================================================================
// Tests
// =============================================================================
