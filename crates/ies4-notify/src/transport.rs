//! The HTTP seam. Everything above it speaks JSON values.

use crate::error::NotifyError;
use reqwest::blocking::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use url::Url;

pub trait Transport {
    fn get(&self, url: &Url, timeout: Duration) -> Result<Value, NotifyError>;
    fn post(&self, url: &Url, body: &Value, timeout: Duration) -> Result<Value, NotifyError>;
}

/// Blocking reqwest transport; each request carries its own timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, NotifyError> {
        let client = Client::builder()
            .user_agent(concat!("ies4/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NotifyError::Client(format!("failed to build http client: {e}")))?;
        Ok(Self { client })
    }

    fn finish(url: &Url, resp: Response) -> Result<Value, NotifyError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(NotifyError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .map_err(|e| NotifyError::InvalidResponse(format!("{url} returned invalid JSON: {e}")))
    }
}

fn unreachable(url: &Url, err: reqwest::Error) -> NotifyError {
    NotifyError::Unreachable {
        url: url.to_string(),
        reason: if err.is_timeout() {
            "timed out".to_string()
        } else {
            err.to_string()
        },
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url, timeout: Duration) -> Result<Value, NotifyError> {
        let resp = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .map_err(|e| unreachable(url, e))?;
        Self::finish(url, resp)
    }

    fn post(&self, url: &Url, body: &Value, timeout: Duration) -> Result<Value, NotifyError> {
        let resp = self
            .client
            .post(url.clone())
            .timeout(timeout)
            .json(body)
            .send()
            .map_err(|e| unreachable(url, e))?;
        Self::finish(url, resp)
    }
}
