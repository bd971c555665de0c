//! Best-effort refresh queue.
//!
//! Runs after a region file has been written. Each step is retried a bounded
//! number of times; failures are recorded, never propagated, so the file
//! mutation that came before stands regardless.

use crate::client::{Endpoint, NotifierClient};
use crate::error::NotifyError;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Not attempted because the service was found unreachable.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub endpoint: Endpoint,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What happened to the last batch of notifications.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotifyStatus {
    pub database: String,
    pub steps: Vec<StepOutcome>,
    /// When the last step that succeeded completed.
    pub last_success: Option<DateTime<Utc>>,
}

impl NotifyStatus {
    pub fn all_succeeded(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Succeeded)
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps
            .iter()
            .filter(|s| s.status != StepStatus::Succeeded)
    }
}

/// An ordered list of endpoints to notify for one database.
pub struct NotificationQueue<'a, T: Transport> {
    client: &'a NotifierClient<T>,
    database: String,
    pending: VecDeque<Endpoint>,
}

impl<'a, T: Transport> NotificationQueue<'a, T> {
    pub fn new(client: &'a NotifierClient<T>, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
            pending: VecDeque::new(),
        }
    }

    /// Liveness probe, reload, re-analysis, report and filter cache rebuild.
    pub fn refresh(client: &'a NotifierClient<T>, database: impl Into<String>) -> Self {
        let mut queue = Self::new(client, database);
        for endpoint in [
            Endpoint::Databases,
            Endpoint::LoadDatabase,
            Endpoint::Analyze,
            Endpoint::ComprehensiveReport,
            Endpoint::FilterSuggestions,
        ] {
            queue.push(endpoint);
        }
        queue
    }

    pub fn push(&mut self, endpoint: Endpoint) {
        self.pending.push_back(endpoint);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn call(&self, endpoint: Endpoint) -> Result<Option<Value>, NotifyError> {
        let db = self.database.as_str();
        match endpoint {
            Endpoint::Databases => {
                let names = self.client.databases()?;
                if !names.iter().any(|n| n.eq_ignore_ascii_case(db)) {
                    tracing::warn!(database = db, "web service does not list this database");
                }
                Ok(Some(Value::from(names)))
            }
            Endpoint::LoadDatabase => self.client.load_database(db).map(Some),
            Endpoint::Analyze => {
                let summary = self.client.analyze(db)?;
                Ok(serde_json::to_value(summary).ok())
            }
            Endpoint::ComprehensiveReport => self.client.comprehensive_report().map(|_| None),
            Endpoint::FilterSuggestions => self.client.filter_suggestions(db).map(|_| None),
            Endpoint::Entity => Err(NotifyError::Client(
                "entity lookups are not refresh steps".into(),
            )),
        }
    }

    fn attempt(&self, endpoint: Endpoint) -> StepOutcome {
        let config = self.client.config();
        let max_attempts = config.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.call(endpoint) {
                Ok(detail) => {
                    return StepOutcome {
                        endpoint,
                        status: StepStatus::Succeeded,
                        attempts,
                        detail,
                        error: None,
                    }
                }
                Err(err) if err.is_retryable() && attempts < max_attempts => {
                    tracing::debug!(%endpoint, attempts, error = %err, "retrying notification");
                    std::thread::sleep(Duration::from_millis(config.retry_backoff_ms));
                }
                Err(err) => {
                    tracing::warn!(%endpoint, attempts, error = %err, "notification failed");
                    return StepOutcome {
                        endpoint,
                        status: StepStatus::Failed,
                        attempts,
                        detail: None,
                        error: Some(err.to_string()),
                    };
                }
            }
        }
    }

    /// Drain the queue. If the liveness probe fails, the rest is skipped.
    pub fn run(mut self) -> NotifyStatus {
        let mut status = NotifyStatus {
            database: self.database.clone(),
            ..NotifyStatus::default()
        };
        let mut unreachable = false;
        while let Some(endpoint) = self.pending.pop_front() {
            if unreachable {
                status.steps.push(StepOutcome {
                    endpoint,
                    status: StepStatus::Skipped,
                    attempts: 0,
                    detail: None,
                    error: Some("web service unreachable".into()),
                });
                continue;
            }
            let outcome = self.attempt(endpoint);
            match outcome.status {
                StepStatus::Succeeded => status.last_success = Some(Utc::now()),
                _ if endpoint == Endpoint::Databases => unreachable = true,
                _ => {}
            }
            status.steps.push(outcome);
        }
        status
    }
}
