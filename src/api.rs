//! Remote call gateway for the catalog API.
//!
//! Every outbound read goes through [`RemoteCall::call`], which the pipeline
//! components take as a seam so tests can script responses without a network.
//! The production implementation retries each read a fixed number of times
//! with no delay between attempts, then gives up with no partial data.

use std::time::Duration;

use anyhow::{Context, bail};
use log::warn;
use serde_json::Value;
use thiserror::Error;

use crate::config::ApiConfig;

/// Attempts per remote read, counting the first try.
pub const CALL_ATTEMPTS: usize = 3;

const CALL_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum ExtractError {
    /// Every attempt at a remote read failed; nothing partial is kept.
    #[error("{endpoint} request failed after {attempts} attempts")]
    RemoteCallExhausted { endpoint: String, attempts: usize },

    /// The upstream returned zero items for the identifier.
    #[error("channel {0} not found")]
    ChannelNotFound(String),

    /// The response body decoded as JSON but not into the expected shape.
    #[error("unexpected {endpoint} payload: {source}")]
    Payload {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A single outbound read against the catalog API.
pub trait RemoteCall {
    fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ExtractError>;
}

/// Blocking HTTP gateway. Appends the API key itself so components and
/// diagnostics never carry it.
pub struct HttpGateway {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl HttpGateway {
    pub fn new(config: &ApiConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(CALL_TIMEOUT).build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn attempt(&self, endpoint: &str, params: &[(&str, &str)]) -> anyhow::Result<Value> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in params {
            request = request.query(name, value);
        }

        match request.call() {
            Ok(response) => response
                .into_json::<Value>()
                .context("decoding response body as JSON"),
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("API error {code}: {body}");
            }
            Err(err) => Err(err).context("transport failure"),
        }
    }
}

impl RemoteCall for HttpGateway {
    fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ExtractError> {
        for attempt in 1..=CALL_ATTEMPTS {
            match self.attempt(endpoint, params) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!("{endpoint} attempt {attempt}/{CALL_ATTEMPTS} failed: {err:#}");
                }
            }
        }
        Err(ExtractError::RemoteCallExhausted {
            endpoint: endpoint.to_string(),
            attempts: CALL_ATTEMPTS,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use serde_json::Value;

    use super::{ExtractError, RemoteCall};

    /// Gateway double that replays a scripted response queue and records
    /// every call it receives, in order.
    pub(crate) struct ScriptedGateway {
        responses: RefCell<VecDeque<Result<Value, ExtractError>>>,
        calls: RefCell<Vec<(String, Vec<(String, String)>)>>,
    }

    impl ScriptedGateway {
        pub(crate) fn new(responses: Vec<Result<Value, ExtractError>>) -> Self {
            Self {
                responses: RefCell::new(responses.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<(String, Vec<(String, String)>)> {
            self.calls.borrow().clone()
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl RemoteCall for ScriptedGateway {
        fn call(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, ExtractError> {
            self.calls.borrow_mut().push((
                endpoint.to_string(),
                params
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            ));
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("gateway called more times than scripted")
        }
    }
}
