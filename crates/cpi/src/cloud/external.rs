//! CPI executable driven over a JSON stdin/stdout protocol.
//!
//! Each call spawns the executable once, writes a single request document
//! to its stdin and reads a single response document from its stdout:
//!
//! ```text
//! -> {"method": "create_vm", "arguments": [...], "context": {"director_uuid": "..."}}
//! <- {"result": "vm-123", "error": null, "log": "..."}
//! ```

use super::Cloud;
use crate::error::{Error, Result};
use crate::retry::{RetryConfig, with_retry};
use crate::types::{DiskSpec, StemcellSpec, VmSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Per-deployment values sent with every request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpiContext {
    pub director_uuid: String,
    /// `cloud_provider.properties` from the manifest
    #[serde(skip_serializing_if = "Value::is_null")]
    pub properties: Value,
}

#[derive(Serialize)]
struct CpiRequest<'a> {
    method: &'a str,
    arguments: &'a [Value],
    context: &'a CpiContext,
}

#[derive(Deserialize)]
struct CpiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<CpiError>,
    #[serde(default)]
    log: String,
}

#[derive(Deserialize)]
struct CpiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    ok_to_retry: bool,
}

/// [`Cloud`] backed by an installed CPI executable
#[derive(Debug, Clone)]
pub struct ExternalCpi {
    command: PathBuf,
    context: CpiContext,
    retry: RetryConfig,
}

impl ExternalCpi {
    pub fn new(command: impl Into<PathBuf>, context: CpiContext) -> Self {
        Self {
            command: command.into(),
            context,
            retry: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    fn call(&self, method: &str, arguments: &[Value]) -> Result<Value> {
        with_retry(&self.retry, method, || self.invoke(method, arguments))
    }

    fn invoke(&self, method: &str, arguments: &[Value]) -> Result<Value> {
        let request = CpiRequest {
            method,
            arguments,
            context: &self.context,
        };
        let payload = serde_json::to_vec(&request)?;
        log::debug!("CPI request: {}", String::from_utf8_lossy(&payload));

        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(&self.command, e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .map_err(|e| Error::io(&self.command, e))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::io(&self.command, e))?;

        if output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::InvalidResponse(format!(
                "CPI '{method}' produced no output (exit status {}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let response: CpiResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::InvalidResponse(format!("CPI '{method}': {e}")))?;

        if !response.log.is_empty() {
            log::debug!("CPI '{method}' log:\n{}", response.log.trim_end());
        }

        if let Some(err) = response.error {
            return Err(Error::Cloud {
                method: method.to_string(),
                kind: err.kind,
                message: err.message,
                ok_to_retry: err.ok_to_retry,
            });
        }

        log::debug!("CPI response: {}", response.result);
        Ok(response.result)
    }

    fn call_for_cid(&self, method: &str, arguments: &[Value]) -> Result<String> {
        match self.call(method, arguments)? {
            Value::String(cid) if !cid.is_empty() => Ok(cid),
            other => Err(Error::InvalidResponse(format!(
                "CPI '{method}' returned {other} instead of a cloud id"
            ))),
        }
    }
}

impl Cloud for ExternalCpi {
    fn create_stemcell(&self, spec: &StemcellSpec) -> Result<String> {
        self.call_for_cid(
            "create_stemcell",
            &[
                json!(spec.image_path.display().to_string()),
                spec.cloud_properties.clone(),
            ],
        )
    }

    fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()> {
        self.call("delete_stemcell", &[json!(stemcell_cid)])
            .map(drop)
    }

    fn create_vm(&self, spec: &VmSpec) -> Result<String> {
        self.call_for_cid(
            "create_vm",
            &[
                json!(spec.agent_id),
                json!(spec.stemcell_cid),
                spec.cloud_properties.clone(),
                spec.networks.clone(),
                json!([]),
                spec.env.clone(),
            ],
        )
    }

    fn delete_vm(&self, vm_cid: &str) -> Result<()> {
        self.call("delete_vm", &[json!(vm_cid)]).map(drop)
    }

    fn create_disk(&self, spec: &DiskSpec, vm_cid: &str) -> Result<String> {
        self.call_for_cid(
            "create_disk",
            &[
                json!(spec.size_mib),
                spec.cloud_properties.clone(),
                json!(vm_cid),
            ],
        )
    }

    fn delete_disk(&self, disk_cid: &str) -> Result<()> {
        self.call("delete_disk", &[json!(disk_cid)]).map(drop)
    }

    fn attach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()> {
        self.call("attach_disk", &[json!(vm_cid), json!(disk_cid)])
            .map(drop)
    }

    fn detach_disk(&self, vm_cid: &str, disk_cid: &str) -> Result<()> {
        self.call("detach_disk", &[json!(vm_cid), json!(disk_cid)])
            .map(drop)
    }
}
