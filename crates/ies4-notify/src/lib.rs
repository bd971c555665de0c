//! Refresh notifications for the IES4 analysis web service.
//!
//! The web service caches region documents and the graphs built from them.
//! After the registry edits a file, this crate asks the service to reload and
//! re-analyze it. Notification is best-effort: the file on disk is the source
//! of truth and a failed refresh can be re-run later.

pub mod client;
pub mod error;
pub mod queue;
pub mod transport;

pub use client::{AnalyzeSummary, Endpoint, NotifierClient};
pub use error::NotifyError;
pub use queue::{NotificationQueue, NotifyStatus, StepOutcome, StepStatus};
pub use transport::{HttpTransport, Transport};

use serde::{Deserialize, Serialize};

/// Per-endpoint timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointTimeouts {
    pub databases: u64,
    pub load_database: u64,
    pub analyze: u64,
    pub comprehensive_report: u64,
    pub filter_suggestions: u64,
    pub entity: u64,
}

impl Default for EndpointTimeouts {
    fn default() -> Self {
        Self {
            databases: 5,
            load_database: 30,
            analyze: 60,
            comprehensive_report: 30,
            filter_suggestions: 15,
            entity: 10,
        }
    }
}

impl EndpointTimeouts {
    pub fn for_endpoint(&self, endpoint: Endpoint) -> u64 {
        match endpoint {
            Endpoint::Databases => self.databases,
            Endpoint::LoadDatabase => self.load_database,
            Endpoint::Analyze => self.analyze,
            Endpoint::ComprehensiveReport => self.comprehensive_report,
            Endpoint::FilterSuggestions => self.filter_suggestions,
            Endpoint::Entity => self.entity,
        }
    }
}

/// Configuration for the notifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifierConfig {
    pub base_url: String,
    pub enabled: bool,
    /// Attempts per step, including the first.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub timeouts: EndpointTimeouts,
    /// Graph layout requested from `/api/analyze`.
    pub layout: String,
    pub show_labels: bool,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            enabled: true,
            max_attempts: 2,
            retry_backoff_ms: 500,
            timeouts: EndpointTimeouts::default(),
            layout: "spring".to_string(),
            show_labels: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::Duration;
    use url::Url;

    /// Scripted transport: responses keyed by URL path, calls recorded.
    #[derive(Default)]
    struct FakeTransport {
        responses: HashMap<String, Vec<Result<Value, u16>>>,
        calls: RefCell<Vec<(String, String, Option<Value>)>>,
    }

    impl FakeTransport {
        fn respond(mut self, path: &str, results: Vec<Result<Value, u16>>) -> Self {
            self.responses.insert(path.to_string(), results);
            self
        }

        fn reply(&self, method: &str, url: &Url, body: Option<&Value>) -> Result<Value, NotifyError> {
            let path = url.path().to_string();
            let n = self
                .calls
                .borrow()
                .iter()
                .filter(|(_, p, _)| p == &path)
                .count();
            self.calls.borrow_mut().push((
                format!("{method} {url}"),
                path.clone(),
                body.cloned(),
            ));
            let scripted = self.responses.get(&path).and_then(|r| r.get(n).or(r.last()));
            match scripted {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(status)) => Err(NotifyError::Status {
                    url: url.to_string(),
                    status: *status,
                    body: String::new(),
                }),
                None => Err(NotifyError::Unreachable {
                    url: url.to_string(),
                    reason: "connection refused".into(),
                }),
            }
        }

        fn call_lines(&self) -> Vec<String> {
            self.calls.borrow().iter().map(|(l, _, _)| l.clone()).collect()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &Url, _timeout: Duration) -> Result<Value, NotifyError> {
            self.reply("GET", url, None)
        }

        fn post(&self, url: &Url, body: &Value, _timeout: Duration) -> Result<Value, NotifyError> {
            self.reply("POST", url, Some(body))
        }
    }

    fn fast_config() -> NotifierConfig {
        NotifierConfig {
            retry_backoff_ms: 0,
            ..NotifierConfig::default()
        }
    }

    fn healthy() -> FakeTransport {
        FakeTransport::default()
            .respond("/api/databases", vec![Ok(json!({"available": ["OP7"], "loaded": []}))])
            .respond(
                "/api/load_database",
                vec![Ok(json!({"status": "success", "entity_counts": {"vehicles": 1}}))],
            )
            .respond(
                "/api/analyze",
                vec![Ok(json!({"status": "success", "node_count": 12, "edge_count": 30}))],
            )
            .respond("/api/comprehensive_report", vec![Ok(json!({"status": "success"}))])
            .respond("/api/filter_suggestions", vec![Ok(json!({"status": "success"}))])
    }

    #[test]
    fn test_refresh_runs_every_step_in_order() {
        let client = NotifierClient::with_transport(fast_config(), healthy()).unwrap();
        let status = NotificationQueue::refresh(&client, "OP7").run();

        assert!(status.all_succeeded());
        assert!(status.last_success.is_some());
        assert_eq!(status.steps.len(), 5);
        assert_eq!(status.steps[2].detail, Some(json!({"node_count": 12, "edge_count": 30})));

        let calls = client_transport_calls(&client);
        assert_eq!(
            calls,
            vec![
                "GET http://127.0.0.1:8080/api/databases",
                "POST http://127.0.0.1:8080/api/load_database",
                "POST http://127.0.0.1:8080/api/analyze",
                "GET http://127.0.0.1:8080/api/comprehensive_report",
                "GET http://127.0.0.1:8080/api/filter_suggestions?database=OP7",
            ]
        );
    }

    fn client_transport_calls(client: &NotifierClient<FakeTransport>) -> Vec<String> {
        client.transport().call_lines()
    }

    #[test]
    fn test_analyze_request_body() {
        let client = NotifierClient::with_transport(fast_config(), healthy()).unwrap();
        client.analyze("OP7").unwrap();
        let calls = client.transport().calls.borrow();
        assert_eq!(
            calls[0].2,
            Some(json!({
                "database_name": "OP7",
                "layout": "spring",
                "show_labels": true,
                "filters": {},
                "force_reload": true
            }))
        );
    }

    #[test]
    fn test_unreachable_service_skips_remaining_steps() {
        let client = NotifierClient::with_transport(fast_config(), FakeTransport::default()).unwrap();
        let status = NotificationQueue::refresh(&client, "OP7").run();

        assert!(!status.all_succeeded());
        assert!(status.last_success.is_none());
        assert_eq!(status.steps[0].status, StepStatus::Failed);
        assert_eq!(status.steps[0].attempts, 2);
        assert!(status.steps[1..].iter().all(|s| s.status == StepStatus::Skipped));
        // one probe plus one retry, nothing else
        assert_eq!(client.transport().call_lines().len(), 2);
    }

    #[test]
    fn test_retries_are_bounded_and_recover() {
        let transport = healthy().respond(
            "/api/analyze",
            vec![Err(503), Ok(json!({"status": "success", "node_count": 1, "edge_count": 0}))],
        );
        let client = NotifierClient::with_transport(fast_config(), transport).unwrap();
        let status = NotificationQueue::refresh(&client, "OP7").run();
        assert!(status.all_succeeded());
        assert_eq!(status.steps[2].attempts, 2);

        let transport = healthy().respond("/api/analyze", vec![Err(500)]);
        let config = NotifierConfig {
            max_attempts: 3,
            ..fast_config()
        };
        let client = NotifierClient::with_transport(config, transport).unwrap();
        let status = NotificationQueue::refresh(&client, "OP7").run();
        assert_eq!(status.steps[2].status, StepStatus::Failed);
        assert_eq!(status.steps[2].attempts, 3);
        // later steps still run after a non-probe failure
        assert_eq!(status.steps[3].status, StepStatus::Succeeded);
        assert_eq!(status.failures().count(), 1);
    }

    #[test]
    fn test_in_band_error_is_rejected_without_retry() {
        let transport = healthy().respond(
            "/api/load_database",
            vec![Ok(json!({"status": "error", "message": "Unknown database"}))],
        );
        let client = NotifierClient::with_transport(fast_config(), transport).unwrap();
        let status = NotificationQueue::refresh(&client, "OP7").run();
        let step = &status.steps[1];
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.attempts, 1);
        assert!(step.error.as_deref().unwrap().contains("Unknown database"));
    }

    #[test]
    fn test_legacy_database_listing_and_entity_lookup() {
        let transport = FakeTransport::default()
            .respond("/api/databases", vec![Ok(json!({"databases": ["OP1", "OP7"]}))])
            .respond(
                "/api/entity/vehicle-mi28-helicopter-op7-001",
                vec![Ok(json!({"status": "success", "entity": {"id": "vehicle-mi28-helicopter-op7-001"}}))],
            );
        let client = NotifierClient::with_transport(fast_config(), transport).unwrap();
        assert_eq!(client.databases().unwrap(), vec!["OP1", "OP7"]);
        let entity = client.entity("vehicle-mi28-helicopter-op7-001", "OP7").unwrap();
        assert_eq!(entity["id"], "vehicle-mi28-helicopter-op7-001");
        assert!(client.transport().call_lines()[1].ends_with("?database=OP7"));
    }

    #[test]
    fn test_base_url_with_path_prefix() {
        let config = NotifierConfig {
            base_url: "http://analysis.local:9000/ies4/".into(),
            ..fast_config()
        };
        let client = NotifierClient::with_transport(config, healthy()).unwrap();
        client.comprehensive_report().unwrap_err();
        assert_eq!(
            client.transport().call_lines(),
            vec!["GET http://analysis.local:9000/ies4/api/comprehensive_report"]
        );
        assert!(NotifierClient::with_transport(
            NotifierConfig {
                base_url: "not a url".into(),
                ..fast_config()
            },
            healthy()
        )
        .is_err());
    }
}
