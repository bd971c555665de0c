//! Machine-readable command results (`--json`).

use ies4_notify::NotifyStatus;
use ies4_registry::{RegionContext, RemovalOutcome, UpsertOutcome, VerificationReport};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Success,
    /// The file was written but the web service was not refreshed.
    Partial,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub status: ReportStatus,
    pub operation: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<UpsertOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removal: Option<RemovalOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notifications: Option<NotifyStatus>,
    /// Command-specific payload: listings, stats, validation issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
}

impl OperationReport {
    pub fn new(operation: &'static str) -> Self {
        Self {
            status: ReportStatus::Success,
            operation,
            region: None,
            path: None,
            upsert: None,
            removal: None,
            verification: None,
            notifications: None,
            data: None,
            error: None,
            error_kind: None,
        }
    }

    pub fn for_region(operation: &'static str, ctx: &RegionContext) -> Self {
        Self {
            region: Some(ctx.code.clone()),
            path: Some(ctx.path.clone()),
            ..Self::new(operation)
        }
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.settle();
        self
    }

    /// Derive `status` from what the report holds.
    pub fn settle(&mut self) {
        self.status = if self.error.is_some() {
            ReportStatus::Failure
        } else if self
            .notifications
            .as_ref()
            .is_some_and(|n| !n.all_succeeded())
        {
            ReportStatus::Partial
        } else {
            ReportStatus::Success
        };
    }

    pub fn exit_code(&self) -> u8 {
        match self.status {
            ReportStatus::Success | ReportStatus::Partial => 0,
            ReportStatus::Failure => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ies4_notify::{Endpoint, StepOutcome, StepStatus};
    use serde_json::json;

    fn notified(status: StepStatus) -> NotifyStatus {
        NotifyStatus {
            database: "OP7".into(),
            steps: vec![StepOutcome {
                endpoint: Endpoint::Databases,
                status,
                attempts: 1,
                detail: None,
                error: None,
            }],
            last_success: None,
        }
    }

    #[test]
    fn test_failed_notification_is_partial() {
        let ctx = RegionContext::new("OP7", "Odesa Oblast", "/data/odesa_oblast.json");
        let mut report = OperationReport::for_region("add", &ctx);
        report.notifications = Some(notified(StepStatus::Failed));
        report.settle();
        assert_eq!(report.status, ReportStatus::Partial);
        assert_eq!(report.exit_code(), 0);

        report.notifications = Some(notified(StepStatus::Succeeded));
        report.settle();
        assert_eq!(report.status, ReportStatus::Success);
    }

    #[test]
    fn test_failure_serializes_error_only() {
        let report = OperationReport::new("show").failed("entity not found");
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({"status": "failure", "operation": "show", "error": "entity not found"})
        );
    }
}
