//! Agent client speaking JSON over HTTP to the VM's message bus endpoint.
//!
//! Request: `POST {mbus}/agent` with `{"method", "arguments", "reply_to"}`.
//! Response: `{"value": ..., "exception": {"message": ...}}`.
//!
//! `stop` and `apply` are asynchronous on the agent side. Their value is a
//! task handle `{"agent_task_id": "...", "state": "running"}` which is polled
//! with `get_task` until the state changes.

use super::{AgentClient, AgentClientFactory};
use crate::error::{Error, Result};
use crate::types::ApplySpec;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::thread;
use std::time::{Duration, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Serialize)]
struct AgentRequest<'a> {
    method: &'a str,
    arguments: &'a [Value],
    reply_to: &'a str,
}

#[derive(Deserialize)]
struct AgentResponse {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    exception: Option<AgentException>,
}

#[derive(Deserialize)]
struct AgentException {
    message: String,
}

pub struct HttpAgentClient {
    agent: ureq::Agent,
    endpoint: String,
    reply_to: String,
    poll_interval: Duration,
    task_timeout: Duration,
}

impl HttpAgentClient {
    /// Client with `request_timeout` applied to each HTTP request
    pub fn new(endpoint: &str, reply_to: &str, request_timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(request_timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            reply_to: reply_to.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_task_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.task_timeout = timeout;
        self
    }

    fn send(&self, method: &str, arguments: &[Value]) -> Result<Value> {
        let url = format!("{}/agent", self.endpoint);
        let request = AgentRequest {
            method,
            arguments,
            reply_to: &self.reply_to,
        };
        log::debug!("Agent request: {method} -> {url}");

        let response: AgentResponse = self
            .agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send_json(&request)?
            .body_mut()
            .read_json()?;

        if let Some(exception) = response.exception {
            return Err(Error::Agent {
                method: method.to_string(),
                message: exception.message,
            });
        }
        Ok(response.value)
    }

    /// Send a long-running request and poll its task until it settles
    fn run_task(&self, method: &str, arguments: &[Value]) -> Result<Value> {
        let mut value = self.send(method, arguments)?;
        let started = Instant::now();

        while let Some(task_id) = running_task_id(&value) {
            if started.elapsed() > self.task_timeout {
                return Err(Error::timeout(format!("agent {method}"), self.task_timeout));
            }
            thread::sleep(self.poll_interval);
            log::trace!("Polling agent task {task_id} ({method})");
            value = self.send("get_task", &[json!(task_id)])?;
        }

        Ok(value)
    }
}

fn running_task_id(value: &Value) -> Option<String> {
    if value.get("state")?.as_str()? != "running" {
        return None;
    }
    value.get("agent_task_id")?.as_str().map(ToString::to_string)
}

impl AgentClient for HttpAgentClient {
    fn ping(&self) -> Result<String> {
        let value = self.send("ping", &[])?;
        Ok(value.as_str().map_or_else(|| value.to_string(), ToString::to_string))
    }

    fn stop(&self) -> Result<()> {
        self.run_task("stop", &[]).map(drop)
    }

    fn apply(&self, spec: &ApplySpec) -> Result<()> {
        let spec = serde_json::to_value(spec)?;
        self.run_task("apply", &[spec]).map(drop)
    }
}

/// Builds [`HttpAgentClient`]s that identify themselves as `reply_to`
#[derive(Debug, Clone)]
pub struct HttpAgentClientFactory {
    reply_to: String,
    request_timeout: Duration,
}

impl HttpAgentClientFactory {
    pub fn new(reply_to: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            reply_to: reply_to.into(),
            request_timeout,
        }
    }
}

impl AgentClientFactory for HttpAgentClientFactory {
    fn create(&self, endpoint: &str) -> Box<dyn AgentClient> {
        Box::new(HttpAgentClient::new(endpoint, &self.reply_to, self.request_timeout))
    }
}
