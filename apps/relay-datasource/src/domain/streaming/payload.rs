//! Upstream payload.

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// One opaque message received from the upstream connection.
///
/// The bytes live in a shared buffer, so cloning a payload for each
/// subscriber does not copy the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    data: Bytes,
    received_at: DateTime<Utc>,
}

impl Payload {
    /// Create a payload stamped with the current time.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::received_at(data, Utc::now())
    }

    /// Create a payload with an explicit receipt time.
    #[must_use]
    pub fn received_at(data: impl Into<Bytes>, received_at: DateTime<Utc>) -> Self {
        Self {
            data: data.into(),
            received_at,
        }
    }

    /// Payload bytes.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Receipt time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}
