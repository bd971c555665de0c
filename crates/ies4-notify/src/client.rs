//! Typed calls against the analysis web service's REST API.

use crate::error::NotifyError;
use crate::transport::{HttpTransport, Transport};
use crate::NotifierConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

/// REST endpoints the notifier knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Databases,
    LoadDatabase,
    Analyze,
    ComprehensiveReport,
    FilterSuggestions,
    Entity,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Databases => "api/databases",
            Endpoint::LoadDatabase => "api/load_database",
            Endpoint::Analyze => "api/analyze",
            Endpoint::ComprehensiveReport => "api/comprehensive_report",
            Endpoint::FilterSuggestions => "api/filter_suggestions",
            Endpoint::Entity => "api/entity",
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Node/edge counts returned by `/api/analyze`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeSummary {
    #[serde(default)]
    pub node_count: u64,
    #[serde(default)]
    pub edge_count: u64,
}

pub struct NotifierClient<T = HttpTransport> {
    config: NotifierConfig,
    base: Url,
    transport: T,
}

impl NotifierClient<HttpTransport> {
    pub fn http(config: NotifierConfig) -> Result<Self, NotifyError> {
        Self::with_transport(config, HttpTransport::new()?)
    }
}

impl<T: Transport> NotifierClient<T> {
    pub fn with_transport(config: NotifierConfig, transport: T) -> Result<Self, NotifyError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| NotifyError::Client(format!("invalid base url `{}`: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(NotifyError::Client(format!(
                "base url `{}` cannot carry a path",
                config.base_url
            )));
        }
        Ok(Self {
            config,
            base,
            transport,
        })
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn url(&self, endpoint: Endpoint, extra: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(endpoint.path().split('/'));
            segments.extend(extra);
        }
        url
    }

    fn timeout(&self, endpoint: Endpoint) -> Duration {
        Duration::from_secs(self.config.timeouts.for_endpoint(endpoint))
    }

    /// The service reports failures in-band as `{status: "error", message}`.
    fn check(endpoint: Endpoint, value: Value) -> Result<Value, NotifyError> {
        if value.get("status").and_then(Value::as_str) == Some("error") {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message")
                .to_string();
            return Err(NotifyError::Rejected {
                endpoint: endpoint.to_string(),
                message,
            });
        }
        Ok(value)
    }

    fn get(&self, endpoint: Endpoint, url: Url) -> Result<Value, NotifyError> {
        tracing::debug!(%url, "GET");
        let value = self.transport.get(&url, self.timeout(endpoint))?;
        Self::check(endpoint, value)
    }

    fn post(&self, endpoint: Endpoint, body: Value) -> Result<Value, NotifyError> {
        let url = self.url(endpoint, &[]);
        tracing::debug!(%url, "POST");
        let value = self.transport.post(&url, &body, self.timeout(endpoint))?;
        Self::check(endpoint, value)
    }

    /// Database names the service knows. Doubles as a liveness probe.
    pub fn databases(&self) -> Result<Vec<String>, NotifyError> {
        let value = self.get(Endpoint::Databases, self.url(Endpoint::Databases, &[]))?;
        let list = value
            .get("available")
            .or_else(|| value.get("databases"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                NotifyError::InvalidResponse("`/api/databases` returned no database list".into())
            })?;
        Ok(list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect())
    }

    /// Ask the service to reload `database` from disk; returns its entity counts.
    pub fn load_database(&self, database: &str) -> Result<Value, NotifyError> {
        let value = self.post(Endpoint::LoadDatabase, json!({ "database_name": database }))?;
        Ok(value.get("entity_counts").cloned().unwrap_or(Value::Null))
    }

    pub fn analyze(&self, database: &str) -> Result<AnalyzeSummary, NotifyError> {
        let value = self.post(
            Endpoint::Analyze,
            json!({
                "database_name": database,
                "layout": self.config.layout,
                "show_labels": self.config.show_labels,
                "filters": {},
                "force_reload": true,
            }),
        )?;
        serde_json::from_value(value)
            .map_err(|e| NotifyError::InvalidResponse(format!("`/api/analyze`: {e}")))
    }

    pub fn comprehensive_report(&self) -> Result<(), NotifyError> {
        self.get(
            Endpoint::ComprehensiveReport,
            self.url(Endpoint::ComprehensiveReport, &[]),
        )?;
        Ok(())
    }

    /// Fetching suggestions forces the service to rebuild its filter cache.
    pub fn filter_suggestions(&self, database: &str) -> Result<(), NotifyError> {
        let mut url = self.url(Endpoint::FilterSuggestions, &[]);
        url.query_pairs_mut().append_pair("database", database);
        self.get(Endpoint::FilterSuggestions, url)?;
        Ok(())
    }

    /// Full record for `id` as the service sees it.
    pub fn entity(&self, id: &str, database: &str) -> Result<Value, NotifyError> {
        let mut url = self.url(Endpoint::Entity, &[id]);
        url.query_pairs_mut().append_pair("database", database);
        let value = self.get(Endpoint::Entity, url)?;
        value
            .get("entity")
            .cloned()
            .ok_or_else(|| NotifyError::InvalidResponse("`/api/entity` returned no entity".into()))
    }
}
