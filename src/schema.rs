//! Job and job-request wire records
//!
//! Typed records for the two payloads the job controller accepts, plus the
//! validators that turn untyped JSON into them. Validation is purely
//! structural: field presence and JSON type, with documented defaults applied
//! only when a field is genuinely absent. Cross-field rules (restart-count
//! ordering, backend-hint compatibility) belong to the lifecycle manager and
//! dispatcher, not here.
//!
//! Both validators share the same open-world policy: unknown payload fields
//! are accepted and ignored, and an explicit JSON `null` is a type mismatch,
//! never absence.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, FieldError};
use crate::Result;

/// A job already accepted into the system
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Job {
    /// Command line to execute
    pub cmd: String,
    /// Container image reference
    pub docker_img: String,
    /// Unique identifier, opaque to this crate
    pub job_id: String,
    /// Restart budget granted to the job
    pub max_restart_count: i64,
    /// Restarts consumed so far; ordering against the budget is the lifecycle
    /// manager's concern and is not checked here
    pub restart_count: i64,
    /// Free-form state label owned by the lifecycle manager
    pub status: String,
    /// Requested CVMFS repository names, comma-separated; the wire contract
    /// keeps this string-serialized rather than a native list
    #[serde(default)]
    pub cvmfs_mounts: String,
}

impl Job {
    /// Validate an untyped payload into a `Job`
    ///
    /// Collects every violated field rather than stopping at the first.
    /// Unknown fields are ignored.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let job = Job {
            cmd: reader.require_str("cmd"),
            docker_img: reader.require_str("docker_img"),
            job_id: reader.require_str("job_id"),
            max_restart_count: reader.require_int("max_restart_count"),
            restart_count: reader.require_int("restart_count"),
            status: reader.require_str("status"),
            cvmfs_mounts: reader.str_or("cvmfs_mounts", ""),
        };
        reader.finish(job, "Job")
    }

    /// Repository names parsed out of the string-serialized `cvmfs_mounts`
    pub fn cvmfs_repositories(&self) -> Vec<&str> {
        split_mounts(&self.cvmfs_mounts)
    }
}

fn default_shared_file_system() -> bool {
    true
}

/// A job yet to be created; superset of submission-time fields
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct JobRequest {
    /// Job name chosen by the submitter
    pub job_name: String,
    /// Shared working directory for this submission
    pub workflow_workspace: String,
    /// Identifier of the owning workflow
    pub workflow_uuid: String,
    /// Container image reference
    pub docker_img: String,
    /// Command line to execute
    #[serde(default)]
    pub cmd: String,
    /// Human-readable rendering of `cmd`
    #[serde(default)]
    pub prettified_cmd: String,
    /// Requested CVMFS repository names, comma-separated
    #[serde(default)]
    pub cvmfs_mounts: String,
    /// Environment variables injected into the job container
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
    /// Whether the job mounts the shared filesystem
    #[serde(default = "default_shared_file_system")]
    pub shared_file_system: bool,
    /// Backend the dispatcher should target; unset means the deployment
    /// default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_backend: Option<String>,
    /// Kerberos credential injection hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kerberos: Option<bool>,
    /// VOMS proxy injection hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voms_proxy: Option<bool>,
    /// UID the Kubernetes backend should run the container as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_uid: Option<i64>,
    /// Whether the image is an unpacked directory rather than a registry
    /// image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpacked_img: Option<bool>,
    /// HTCondor runtime-cap hint; boolean on the wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub htcondor_max_runtime: Option<bool>,
}

impl JobRequest {
    /// Validate an untyped payload into a `JobRequest`
    ///
    /// Collects every violated field rather than stopping at the first.
    /// Unknown fields are ignored; absent optional hints stay unset so the
    /// backend can tell "not provided" from an explicit value.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let request = JobRequest {
            job_name: reader.require_str("job_name"),
            workflow_workspace: reader.require_str("workflow_workspace"),
            workflow_uuid: reader.require_str("workflow_uuid"),
            docker_img: reader.require_str("docker_img"),
            cmd: reader.str_or("cmd", ""),
            prettified_cmd: reader.str_or("prettified_cmd", ""),
            cvmfs_mounts: reader.str_or("cvmfs_mounts", ""),
            env_vars: reader.env_vars("env_vars"),
            shared_file_system: reader.bool_or("shared_file_system", true),
            compute_backend: reader.opt_str("compute_backend"),
            kerberos: reader.opt_bool("kerberos"),
            voms_proxy: reader.opt_bool("voms_proxy"),
            kubernetes_uid: reader.opt_int("kubernetes_uid"),
            unpacked_img: reader.opt_bool("unpacked_img"),
            htcondor_max_runtime: reader.opt_bool("htcondor_max_runtime"),
        };
        reader.finish(request, "JobRequest")
    }

    /// Repository names parsed out of the string-serialized `cvmfs_mounts`
    pub fn cvmfs_repositories(&self) -> Vec<&str> {
        split_mounts(&self.cvmfs_mounts)
    }
}

fn split_mounts(mounts: &str) -> Vec<&str> {
    mounts
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

// =============================================================================
// PayloadReader
// =============================================================================

/// Field-by-field payload reader that records every violation instead of
/// stopping at the first
struct PayloadReader<'a> {
    fields: Option<&'a serde_json::Map<String, Value>>,
    errors: Vec<FieldError>,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a Value) -> Self {
        match payload.as_object() {
            Some(fields) => Self {
                fields: Some(fields),
                errors: Vec::new(),
            },
            None => Self {
                fields: None,
                errors: vec![FieldError::invalid_type("payload", "object")],
            },
        }
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields.and_then(|fields| fields.get(field))
    }

    fn require_str(&mut self, field: &str) -> String {
        match self.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.errors.push(FieldError::invalid_type(field, "string"));
                String::new()
            }
            None => {
                self.errors.push(FieldError::missing(field));
                String::new()
            }
        }
    }

    fn require_int(&mut self, field: &str) -> i64 {
        match self.get(field).map(Value::as_i64) {
            Some(Some(n)) => n,
            Some(None) => {
                self.errors.push(FieldError::invalid_type(field, "integer"));
                0
            }
            None => {
                self.errors.push(FieldError::missing(field));
                0
            }
        }
    }

    fn str_or(&mut self, field: &str, default: &str) -> String {
        match self.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                self.errors.push(FieldError::invalid_type(field, "string"));
                default.to_string()
            }
            None => default.to_string(),
        }
    }

    fn bool_or(&mut self, field: &str, default: bool) -> bool {
        match self.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.errors.push(FieldError::invalid_type(field, "boolean"));
                default
            }
            None => default,
        }
    }

    fn opt_str(&mut self, field: &str) -> Option<String> {
        match self.get(field) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.errors.push(FieldError::invalid_type(field, "string"));
                None
            }
            None => None,
        }
    }

    fn opt_bool(&mut self, field: &str) -> Option<bool> {
        match self.get(field) {
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.errors.push(FieldError::invalid_type(field, "boolean"));
                None
            }
            None => None,
        }
    }

    fn opt_int(&mut self, field: &str) -> Option<i64> {
        match self.get(field).map(Value::as_i64) {
            Some(Some(n)) => Some(n),
            Some(None) => {
                self.errors.push(FieldError::invalid_type(field, "integer"));
                None
            }
            None => None,
        }
    }

    fn env_vars(&mut self, field: &str) -> BTreeMap<String, String> {
        match self.get(field) {
            Some(Value::Object(map)) => {
                let mut vars = BTreeMap::new();
                for (key, value) in map {
                    match value {
                        Value::String(s) => {
                            vars.insert(key.clone(), s.clone());
                        }
                        _ => {
                            self.errors.push(FieldError::invalid_type(
                                field,
                                "map of string to string",
                            ));
                            return BTreeMap::new();
                        }
                    }
                }
                vars
            }
            Some(_) => {
                self.errors
                    .push(FieldError::invalid_type(field, "map of string to string"));
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        }
    }

    fn finish<T>(self, record: T, kind: &'static str) -> Result<T> {
        if self.errors.is_empty() {
            debug!(record = kind, "payload accepted");
            Ok(record)
        } else {
            warn!(
                record = kind,
                violations = self.errors.len(),
                "payload rejected"
            );
            Err(Error::validation(self.errors))
        }
    }
}
