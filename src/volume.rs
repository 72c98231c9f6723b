//! Volume descriptor compilation
//!
//! Typed builders for the volume objects attached to a job's execution
//! container: the shared filesystem (CephFS), CVMFS software repositories,
//! and direct host paths. Each descriptor is an explicit structured object -
//! never a string template - so substitution values cannot produce malformed
//! JSON.
//!
//! Two descriptor generations exist and are selected explicitly at startup
//! via [`VolumeProfile`]; they have different trust boundaries (legacy embeds
//! a caller-validated repository host into flex-volume driver options, the
//! current profile only names pre-provisioned claims) and are never merged.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::Catalogs;
use crate::error::{Error, FieldError};
use crate::{Result, CEPHFS_SECRET_NAME};

/// CephFS monitor addresses baked into legacy cluster deployments
pub const CEPHFS_MONITORS: [&str; 3] = [
    "128.142.36.227:6790",
    "128.142.39.77:6790",
    "128.142.39.144:6790",
];

/// Volume name of the pre-provisioned shared filesystem (current profile)
pub const SHARED_VOLUME_NAME: &str = "reana-shared-volume";

/// Claim name of the pre-provisioned shared filesystem (current profile)
pub const SHARED_VOLUME_CLAIM_NAME: &str = "manila-cephfs-pvc";

/// Flex-volume driver handling legacy CVMFS mounts
const CVMFS_FLEX_DRIVER: &str = "cern/cvmfs";

// =============================================================================
// Volume Types
// =============================================================================

/// A pod volume descriptor; exactly one source is populated per kind
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name referenced by container volume mounts
    pub name: String,
    /// CephFS source (legacy shared filesystem)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cephfs: Option<CephfsVolumeSource>,
    /// Flex-volume source (legacy CVMFS driver)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flex_volume: Option<FlexVolumeSource>,
    /// Persistent-volume-claim source (current shared filesystem and CVMFS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PvcVolumeSource>,
    /// Host-path source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathVolumeSource>,
    /// Read-only marker on claim-backed descriptors; stringly typed on the
    /// wire
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<String>,
}

impl Volume {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cephfs: None,
            flex_volume: None,
            persistent_volume_claim: None,
            host_path: None,
            read_only: None,
        }
    }

    /// Create a Volume backed by CephFS.
    pub fn from_cephfs(name: impl Into<String>, cephfs: CephfsVolumeSource) -> Self {
        Self {
            cephfs: Some(cephfs),
            ..Self::named(name)
        }
    }

    /// Create a Volume backed by a flex-volume driver.
    pub fn from_flex_volume(name: impl Into<String>, flex_volume: FlexVolumeSource) -> Self {
        Self {
            flex_volume: Some(flex_volume),
            ..Self::named(name)
        }
    }

    /// Create a Volume backed by a persistent volume claim.
    pub fn from_persistent_volume_claim(
        name: impl Into<String>,
        claim_name: impl Into<String>,
        read_only: bool,
    ) -> Self {
        Self {
            persistent_volume_claim: Some(PvcVolumeSource {
                claim_name: claim_name.into(),
            }),
            read_only: Some(if read_only { "true" } else { "false" }.to_string()),
            ..Self::named(name)
        }
    }

    /// Create a Volume backed by a path on the orchestration node.
    pub fn from_host_path(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host_path: Some(HostPathVolumeSource { path: path.into() }),
            ..Self::named(name)
        }
    }

    /// Serialize to a JSON value for callers assembling pod specs.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// CephFS volume source
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CephfsVolumeSource {
    /// Monitor addresses of the Ceph cluster
    pub monitors: Vec<String>,
    /// Path within the filesystem to mount
    pub path: String,
    /// Ceph client user
    pub user: String,
    /// Reference to the secret holding the client credentials
    pub secret_ref: CephfsSecretRef,
}

/// Secret reference carried inside a CephFS source
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CephfsSecretRef {
    /// Secret name
    pub name: String,
    /// Whether the mount is read-only
    pub read_only: bool,
}

/// Flex-volume source driving legacy CVMFS mounts
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlexVolumeSource {
    /// Driver name
    pub driver: String,
    /// Driver option map
    pub options: FlexVolumeOptions,
}

/// Options handed to the CVMFS flex-volume driver
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlexVolumeOptions {
    /// Physical repository host to mount
    pub repository: String,
}

/// Persistent-volume-claim source
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PvcVolumeSource {
    /// Claim name
    pub claim_name: String,
}

/// Host-path volume source
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostPathVolumeSource {
    /// Path on the orchestration node
    pub path: String,
}

// =============================================================================
// VolumeProfile
// =============================================================================

/// Which generation of volume descriptors the deployment targets
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VolumeProfile {
    /// CephFS via in-tree driver and CVMFS via the `cern/cvmfs` flex-volume;
    /// repository names are validated against the catalog before being
    /// embedded into driver options
    Legacy,
    /// Pre-provisioned persistent volume claims; CVMFS claims are keyed by
    /// experiment and no repository validation occurs
    #[default]
    Current,
}

impl std::fmt::Display for VolumeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Legacy => write!(f, "legacy"),
            Self::Current => write!(f, "current"),
        }
    }
}

impl std::str::FromStr for VolumeProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "current" => Ok(Self::Current),
            _ => Err(Error::unknown_resource(s, "volume profiles")),
        }
    }
}

// =============================================================================
// VolumeSpecGenerator
// =============================================================================

/// Compiles storage intents into pod volume descriptors
///
/// Stateless over an immutable catalog snapshot: identical inputs always
/// produce structurally identical output, and any thread may call any
/// operation without locking.
pub struct VolumeSpecGenerator<'a> {
    profile: VolumeProfile,
    catalogs: &'a Catalogs,
    default_mount_fallback: bool,
}

impl<'a> VolumeSpecGenerator<'a> {
    /// Create a generator targeting the given profile
    pub fn new(profile: VolumeProfile, catalogs: &'a Catalogs) -> Self {
        Self {
            profile,
            catalogs,
            default_mount_fallback: false,
        }
    }

    /// Opt in to the storage catalog's `"default"` entry for unknown
    /// experiments
    ///
    /// Without this, a mount-path lookup miss surfaces as
    /// [`Error::UnknownResource`].
    pub fn with_default_mount_fallback(mut self) -> Self {
        self.default_mount_fallback = true;
        self
    }

    /// The profile this generator targets
    pub fn profile(&self) -> VolumeProfile {
        self.profile
    }

    fn mount_path(&self, experiment: &str) -> Result<&str> {
        let lookup = if self.default_mount_fallback {
            self.catalogs.storage.mount_path_or_default(experiment)
        } else {
            self.catalogs.storage.mount_path(experiment)
        };
        lookup.map_err(|err| {
            warn!(experiment, "no storage mount path for experiment");
            err
        })
    }

    /// Shared-filesystem volume for an experiment
    ///
    /// Legacy: CephFS descriptor with the experiment's catalog mount path.
    /// Current: the fixed pre-provisioned claim, no catalog lookup at all.
    pub fn shared_filesystem_volume(&self, experiment: &str) -> Result<Volume> {
        match self.profile {
            VolumeProfile::Legacy => {
                let path = self.mount_path(experiment)?;
                Ok(Volume::from_cephfs(
                    format!("{experiment}-shared-volume"),
                    CephfsVolumeSource {
                        monitors: CEPHFS_MONITORS.iter().map(ToString::to_string).collect(),
                        path: path.to_string(),
                        user: "k8s".to_string(),
                        secret_ref: CephfsSecretRef {
                            name: CEPHFS_SECRET_NAME.to_string(),
                            read_only: false,
                        },
                    },
                ))
            }
            VolumeProfile::Current => Ok(Volume::from_persistent_volume_claim(
                SHARED_VOLUME_NAME,
                SHARED_VOLUME_CLAIM_NAME,
                false,
            )),
        }
    }

    /// CVMFS volume for an experiment
    ///
    /// Legacy: requires a repository name, validates it against the catalog,
    /// and mounts the physical repository host through the flex-volume
    /// driver. Current: the repository argument is ignored - the claim is
    /// keyed by experiment alone and no validation occurs.
    pub fn cvmfs_volume(&self, experiment: &str, repository: Option<&str>) -> Result<Volume> {
        match self.profile {
            VolumeProfile::Legacy => {
                let repository = repository.ok_or_else(|| {
                    Error::validation(vec![FieldError::missing("repository")])
                })?;
                let host = self.catalogs.repositories.host(repository).map_err(|err| {
                    warn!(repository, "unknown CVMFS repository requested");
                    err
                })?;
                Ok(Volume::from_flex_volume(
                    format!("cvmfs-{experiment}"),
                    FlexVolumeSource {
                        driver: CVMFS_FLEX_DRIVER.to_string(),
                        options: FlexVolumeOptions {
                            repository: host.to_string(),
                        },
                    },
                ))
            }
            VolumeProfile::Current => Ok(Volume::from_persistent_volume_claim(
                format!("{experiment}-cvmfs-volume"),
                format!("csi-cvmfs-{experiment}-pvc"),
                true,
            )),
        }
    }

    /// Host-path volume bound to the experiment's storage mount path
    pub fn host_path_volume(&self, experiment: &str) -> Result<Volume> {
        let path = self.mount_path(experiment)?;
        Ok(Volume::from_host_path(
            format!("{experiment}-shared-volume"),
            path,
        ))
    }

    /// Mount point of a CVMFS repository inside job containers (legacy
    /// lookup): `/cvmfs/<physical host>`
    pub fn cvmfs_mount_point(&self, repository: &str) -> Result<String> {
        self.catalogs.repositories.mount_point(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalogs() -> Catalogs {
        Catalogs::builtin()
    }

    // =========================================================================
    // Legacy profile
    // =========================================================================

    #[test]
    fn legacy_shared_filesystem_renders_cephfs_descriptor() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let volume = generator.shared_filesystem_volume("atlas").unwrap();
        assert_eq!(
            volume.to_value(),
            json!({
                "name": "atlas-shared-volume",
                "cephfs": {
                    "monitors": [
                        "128.142.36.227:6790",
                        "128.142.39.77:6790",
                        "128.142.39.144:6790"
                    ],
                    "path": "/reana/atlas",
                    "user": "k8s",
                    "secretRef": {
                        "name": "ceph-secret",
                        "readOnly": false
                    }
                }
            })
        );
    }

    #[test]
    fn legacy_shared_filesystem_is_strict_by_default() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let err = generator.shared_filesystem_volume("belle2").unwrap_err();
        assert!(matches!(err, Error::UnknownResource { .. }));
    }

    #[test]
    fn legacy_shared_filesystem_fallback_is_opt_in() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs)
            .with_default_mount_fallback();
        let volume = generator.shared_filesystem_volume("belle2").unwrap();
        assert_eq!(volume.cephfs.unwrap().path, "/reana/default");
    }

    #[test]
    fn legacy_cvmfs_mounts_the_physical_repository_host() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let volume = generator.cvmfs_volume("atlas", Some("atlas")).unwrap();
        assert_eq!(
            volume.to_value(),
            json!({
                "name": "cvmfs-atlas",
                "flexVolume": {
                    "driver": "cern/cvmfs",
                    "options": {
                        "repository": "atlas.cern.ch"
                    }
                }
            })
        );
    }

    #[test]
    fn legacy_cvmfs_rejects_unknown_repositories() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let err = generator
            .cvmfs_volume("atlas", Some("not-a-real-repo"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownResource { ref identifier, .. } if identifier == "not-a-real-repo"
        ));
    }

    #[test]
    fn legacy_cvmfs_requires_a_repository_argument() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let err = generator.cvmfs_volume("atlas", None).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation { ref errors } if errors == &[FieldError::missing("repository")]
        ));
    }

    #[test]
    fn host_path_volume_renders_direct_mount() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let volume = generator.host_path_volume("lhcb").unwrap();
        assert_eq!(
            volume.to_value(),
            json!({
                "name": "lhcb-shared-volume",
                "hostPath": {
                    "path": "/reana/lhcb"
                }
            })
        );
    }

    #[test]
    fn cvmfs_mount_point_uses_the_physical_host() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        assert_eq!(
            generator.cvmfs_mount_point("cms").unwrap(),
            "/cvmfs/cms.cern.ch"
        );
        assert!(generator.cvmfs_mount_point("not-a-real-repo").is_err());
    }

    // =========================================================================
    // Current profile
    // =========================================================================

    #[test]
    fn current_shared_filesystem_is_the_fixed_claim() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Current, &catalogs);
        // Experiment does not participate in the current shared descriptor
        let volume = generator.shared_filesystem_volume("belle2").unwrap();
        assert_eq!(
            volume.to_value(),
            json!({
                "name": "reana-shared-volume",
                "persistentVolumeClaim": {
                    "claimName": "manila-cephfs-pvc"
                },
                "readOnly": "false"
            })
        );
    }

    #[test]
    fn current_cvmfs_is_keyed_by_experiment_only() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Current, &catalogs);
        let volume = generator.cvmfs_volume("atlas", None).unwrap();
        assert_eq!(
            volume.to_value(),
            json!({
                "name": "atlas-cvmfs-volume",
                "persistentVolumeClaim": {
                    "claimName": "csi-cvmfs-atlas-pvc"
                },
                "readOnly": "true"
            })
        );
    }

    #[test]
    fn current_cvmfs_never_consults_the_repository_catalog() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Current, &catalogs);
        // An unrecognized repository argument is simply ignored
        let volume = generator
            .cvmfs_volume("atlas", Some("not-a-real-repo"))
            .unwrap();
        assert_eq!(volume.name, "atlas-cvmfs-volume");
    }

    // =========================================================================
    // Cross-profile properties
    // =========================================================================

    #[test]
    fn rendering_is_idempotent() {
        let catalogs = catalogs();
        for profile in [VolumeProfile::Legacy, VolumeProfile::Current] {
            let generator = VolumeSpecGenerator::new(profile, &catalogs);
            let first = generator.shared_filesystem_volume("cms").unwrap();
            let second = generator.shared_filesystem_volume("cms").unwrap();
            assert_eq!(first, second);
            assert_eq!(first.to_value(), second.to_value());
        }
        // Catalogs are untouched by rendering
        assert_eq!(catalogs, Catalogs::builtin());
    }

    #[test]
    fn profile_parses_and_displays() {
        assert_eq!("legacy".parse::<VolumeProfile>().unwrap(), VolumeProfile::Legacy);
        assert_eq!("Current".parse::<VolumeProfile>().unwrap(), VolumeProfile::Current);
        assert_eq!(VolumeProfile::Legacy.to_string(), "legacy");
        assert!(matches!(
            "flexvolume".parse::<VolumeProfile>(),
            Err(Error::UnknownResource { .. })
        ));
    }

    #[test]
    fn volume_round_trips_through_serde() {
        let catalogs = catalogs();
        let generator = VolumeSpecGenerator::new(VolumeProfile::Legacy, &catalogs);
        let volume = generator.shared_filesystem_volume("alice").unwrap();
        let back: Volume = serde_json::from_value(volume.to_value()).unwrap();
        assert_eq!(back, volume);
    }
}
