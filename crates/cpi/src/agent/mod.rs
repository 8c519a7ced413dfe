//! Clients for the agent running on the deployed VM.

mod http;

pub use http::{HttpAgentClient, HttpAgentClientFactory};

use crate::error::{Error, Result};
use crate::types::ApplySpec;
use std::thread;
use std::time::Duration;

/// Control channel to the agent on one VM
pub trait AgentClient: Send + Sync {
    /// Liveness check. Returns the agent's answer (usually `"pong"`).
    fn ping(&self) -> Result<String>;

    /// Stop all jobs on the VM, waiting for the agent to finish
    fn stop(&self) -> Result<()>;

    /// Push the desired job configuration, waiting for the agent to finish
    fn apply(&self, spec: &ApplySpec) -> Result<()>;
}

/// Builds an [`AgentClient`] for a message bus endpoint
pub trait AgentClientFactory: Send + Sync {
    fn create(&self, endpoint: &str) -> Box<dyn AgentClient>;
}

/// Ping until the agent answers, at most `attempts` times.
pub fn wait_until_ready(client: &dyn AgentClient, attempts: u32, interval: Duration) -> Result<()> {
    let mut last_error = None;
    for attempt in 1..=attempts.max(1) {
        match client.ping() {
            Ok(_) => {
                log::debug!("Agent answered ping after {attempt} attempt(s)");
                return Ok(());
            }
            Err(e) => {
                log::trace!("Agent ping {attempt}/{attempts} failed: {e}");
                last_error = Some(e);
                if attempt < attempts {
                    thread::sleep(interval);
                }
            }
        }
    }

    let waited = interval * attempts.saturating_sub(1);
    match last_error {
        Some(Error::Timeout { .. }) | None => Err(Error::timeout("agent ping", waited)),
        Some(e) => Err(Error::Agent {
            method: "ping".to_string(),
            message: format!("agent not reachable after {attempts} attempts: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Call, CallLog, FakeAgentClient};

    #[test]
    fn test_wait_until_ready_first_ping() {
        let log = CallLog::new();
        let client = FakeAgentClient::new(log.clone());

        wait_until_ready(&client, 3, Duration::from_millis(1)).unwrap();
        assert_eq!(log.calls(), vec![Call::Ping]);
    }

    #[test]
    fn test_wait_until_ready_gives_up() {
        let log = CallLog::new();
        let client = FakeAgentClient::new(log.clone());
        client.fail_on("ping", "connection refused");

        let err = wait_until_ready(&client, 3, Duration::from_millis(1)).unwrap_err();
        assert!(err.to_string().contains("after 3 attempts"));
        assert_eq!(log.calls(), vec![Call::Ping, Call::Ping, Call::Ping]);
    }
}
