//! REST-facing result types for single and bulk command submission (§6).

use crate::error::ErrorCode;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Failed,
    Timeout,
    Unauthorized,
}

#[derive(Clone, Debug, Serialize)]
pub struct OperationResult {
    pub entity_id: String,
    pub status: OperationStatus,
    pub error_message: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub execution_time_ms: u64,
}

impl OperationResult {
    pub fn success(entity_id: String, execution_time_ms: u64) -> Self {
        Self { entity_id, status: OperationStatus::Success, error_message: None, error_code: None, execution_time_ms }
    }

    pub fn failed(entity_id: String, error_code: ErrorCode, error_message: String, execution_time_ms: u64) -> Self {
        Self {
            entity_id,
            status: OperationStatus::Failed,
            error_message: Some(error_message),
            error_code: Some(error_code),
            execution_time_ms,
        }
    }

    pub fn timeout(entity_id: String, execution_time_ms: u64) -> Self {
        Self {
            entity_id,
            status: OperationStatus::Timeout,
            error_message: Some("operation timed out".to_string()),
            error_code: Some(ErrorCode::TxTimeout),
            execution_time_ms,
        }
    }
}

/// Options accepted alongside `POST /entities/bulk-control`.
#[derive(Clone, Debug)]
pub struct BulkOptions {
    pub ignore_errors: bool,
    pub timeout_seconds: u64,
    /// Bounded parallelism; default 16 per §4.5.
    pub concurrency: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self { ignore_errors: false, timeout_seconds: 30, concurrency: 16 }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BulkOperationResult {
    pub operation_id: Uuid,
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<OperationResult>,
    pub total_execution_time_ms: u64,
}
