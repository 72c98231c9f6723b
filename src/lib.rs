//! Core contracts for the REANA job controller
//!
//! Validates incoming job payloads and compiles storage intents into the
//! volume descriptors attached to a job's execution container. The HTTP
//! surface, the scheduler, and job lifecycle tracking live elsewhere; this
//! crate only answers two questions:
//!
//! - Is this `Job`/`JobRequest` payload well formed, and with which defaults?
//! - Given an experiment or CVMFS repository name, which volume object does
//!   the orchestration backend get?
//!
//! # Modules
//!
//! - [`schema`] - `Job`/`JobRequest` records and payload validation
//! - [`volume`] - Typed volume descriptors and the `VolumeSpecGenerator`
//! - [`catalog`] - Immutable storage and repository lookup tables
//! - [`error`] - Error types for validation and catalog lookups
//!
//! # Usage
//!
//! ```rust,ignore
//! let catalogs = Catalogs::builtin();
//! let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
//! let volume = generator.cvmfs_volume("atlas", Some("atlas"))?;
//! ```

#![deny(missing_docs)]

pub mod catalog;
pub mod error;
pub mod schema;
pub mod volume;

pub use catalog::{Catalogs, RepositoryCatalog, StorageMountCatalog};
pub use error::{Error, FieldError, FieldErrorKind};
pub use schema::{Job, JobRequest};
pub use volume::{Volume, VolumeProfile, VolumeSpecGenerator};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Name of the Kubernetes secret holding the CephFS client credentials
///
/// Legacy shared-filesystem descriptors reference this secret by name only;
/// provisioning it is cluster administration, not this crate.
pub const CEPHFS_SECRET_NAME: &str = "ceph-secret";

/// Mount path of the shared storage volume inside job containers
pub const STORAGE_MOUNT_PATH: &str = "/data";
