//! Wire types of the read API.

use serde::{Deserialize, Serialize};

use crate::snapshot::SnapshotSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Api,
}

/// Body of `GET /api/crypto`, for both outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    /// Epoch milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SnapshotSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceResponse {
    pub fn ok(source: Source, timestamp: i64, data: SnapshotSet) -> PriceResponse {
        PriceResponse {
            success: true,
            source: Some(source),
            timestamp,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: String, timestamp: i64) -> PriceResponse {
        PriceResponse {
            success: false,
            source: None,
            timestamp,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> HealthResponse {
        HealthResponse {
            status: "ok".to_owned(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_body_omits_data_and_source() {
        let body = serde_json::to_value(PriceResponse::failure("boom".to_owned(), 42)).unwrap();
        assert_eq!(body, json!({ "success": false, "timestamp": 42, "error": "boom" }));
    }

    #[test]
    fn success_body_names_source() {
        let body =
            serde_json::to_value(PriceResponse::ok(Source::Cache, 7, SnapshotSet::new())).unwrap();
        assert_eq!(
            body,
            json!({ "success": true, "source": "cache", "timestamp": 7, "data": {} })
        );
    }

    #[test]
    fn only_ok_status_is_healthy() {
        let degraded: HealthResponse = serde_json::from_value(json!({ "status": "degraded" })).unwrap();
        assert!(!degraded.is_ok());
        assert!(HealthResponse::ok().is_ok());
    }
}
