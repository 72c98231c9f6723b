//! Static storage catalogs
//!
//! Lookup tables mapping symbolic names (an experiment, a CVMFS repository)
//! to physical storage locations. Catalogs are built once at startup and
//! never mutated; callers share them by reference, so any thread may consult
//! them without locking. A lookup miss is a domain error, never a silent
//! default - the storage catalog's `"default"` entry is only reachable
//! through [`StorageMountCatalog::mount_path_or_default`].

use std::collections::BTreeMap;

use crate::error::Error;
use crate::Result;

/// Catalog name reported by failed storage-path lookups
const STORAGE_CATALOG: &str = "storage mount catalog";

/// Catalog name reported by failed repository lookups
const REPOSITORY_CATALOG: &str = "CVMFS repository catalog";

/// Entry consulted by [`StorageMountCatalog::mount_path_or_default`]
const DEFAULT_ENTRY: &str = "default";

// =============================================================================
// StorageMountCatalog
// =============================================================================

/// Experiment name → absolute shared-storage mount path on the cluster host
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageMountCatalog {
    paths: BTreeMap<String, String>,
}

impl StorageMountCatalog {
    /// Build a catalog from (experiment, mount path) entries
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            paths: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Strict lookup of the mount path for an experiment
    ///
    /// A miss is an [`Error::UnknownResource`]; the `"default"` entry is not
    /// consulted here.
    pub fn mount_path(&self, experiment: &str) -> Result<&str> {
        self.paths
            .get(experiment)
            .map(String::as_str)
            .ok_or_else(|| Error::unknown_resource(experiment, STORAGE_CATALOG))
    }

    /// Lookup falling back to the catalog's `"default"` entry
    ///
    /// The fallback is an intentional catalog entry, not error suppression;
    /// call sites opt in explicitly (see
    /// [`VolumeSpecGenerator::with_default_mount_fallback`]). Fails only when
    /// the catalog carries no `"default"` entry either.
    ///
    /// [`VolumeSpecGenerator::with_default_mount_fallback`]:
    /// crate::volume::VolumeSpecGenerator::with_default_mount_fallback
    pub fn mount_path_or_default(&self, experiment: &str) -> Result<&str> {
        self.paths
            .get(experiment)
            .or_else(|| self.paths.get(DEFAULT_ENTRY))
            .map(String::as_str)
            .ok_or_else(|| Error::unknown_resource(experiment, STORAGE_CATALOG))
    }
}

// =============================================================================
// RepositoryCatalog
// =============================================================================

/// Symbolic CVMFS repository name → physical repository host domain
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepositoryCatalog {
    hosts: BTreeMap<String, String>,
}

impl RepositoryCatalog {
    /// Build a catalog from (repository, host domain) entries
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            hosts: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Physical repository host for a symbolic repository name
    pub fn host(&self, repository: &str) -> Result<&str> {
        self.hosts
            .get(repository)
            .map(String::as_str)
            .ok_or_else(|| Error::unknown_resource(repository, REPOSITORY_CATALOG))
    }

    /// Whether the repository name has a catalog entry
    pub fn contains(&self, repository: &str) -> bool {
        self.hosts.contains_key(repository)
    }

    /// Mount point of the repository inside job containers: `/cvmfs/<host>`
    pub fn mount_point(&self, repository: &str) -> Result<String> {
        Ok(format!("/cvmfs/{}", self.host(repository)?))
    }
}

// =============================================================================
// Catalogs
// =============================================================================

/// The process-wide catalog snapshot handed to the volume generator
///
/// Construct once (normally via [`Catalogs::builtin`]) before spawning any
/// callers, then share by reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalogs {
    /// Experiment → shared-storage mount path
    pub storage: StorageMountCatalog,
    /// Symbolic repository name → physical CVMFS host
    pub repositories: RepositoryCatalog,
}

impl Catalogs {
    /// The fixed production lookup tables
    pub fn builtin() -> Self {
        let storage = StorageMountCatalog::from_entries([
            ("alice", "/reana/alice"),
            ("atlas", "/reana/atlas"),
            ("cms", "/reana/cms"),
            ("lhcb", "/reana/lhcb"),
            (DEFAULT_ENTRY, "/reana/default"),
        ]);

        let repositories = RepositoryCatalog::from_entries([
            ("alice", "alice.cern.ch"),
            ("alice-ocdb", "alice-ocdb.cern.ch"),
            ("atlas", "atlas.cern.ch"),
            ("atlas-condb", "atlas-condb.cern.ch"),
            ("cms", "cms.cern.ch"),
            ("lhcb", "lhcb.cern.ch"),
            ("na61", "na61.cern.ch"),
            ("boss", "boss.cern.ch"),
            ("grid", "grid.cern.ch"),
            ("sft", "sft.cern.ch"),
            ("geant4", "geant4.cern.ch"),
        ]);

        Self {
            storage,
            repositories,
        }
    }
}
