//! Discovers whether the optional volume-snapshot schema is installed and
//! answers "does PVC X in namespace N have a ready, Retain-policy snapshot?".
//!
//! Discovery happens once, at construction, via a single dynamic list. A
//! failure there never fails startup: the probe is kept around in an
//! always-negative state and the engine falls back to reclaim-policy-only
//! decisions.

use async_trait::async_trait;
use kube::api::{Api, ListParams};
use kube::core::DynamicObject;
use kube::Client;
use std::sync::Arc;
use tracing::warn;

use crate::error::ReaderError;
use crate::reader::{volume_snapshot_resource, ClusterReader, DeletionPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    pub name: String,
    pub namespace: String,
}

#[async_trait]
pub trait SnapshotProbe: Send + Sync {
    /// Returns the first ready snapshot of `pvc_name` in `namespace` whose
    /// snapshot class has deletion policy `Retain`. `None` covers both "no
    /// such snapshot exists" and "the schema isn't installed or the read
    /// failed" — both mean the same thing to a caller deciding whether
    /// deletion is safe: the probe never fabricates safety from an error.
    async fn has_ready_retain_snapshot(
        &self,
        namespace: &str,
        pvc_name: &str,
    ) -> Option<SnapshotDescriptor>;
}

pub struct KubeSnapshotProbe {
    reader: Arc<dyn ClusterReader>,
    schema_present: bool,
}

impl KubeSnapshotProbe {
    /// Attempts a single list of VolumeSnapshots cluster-wide to determine
    /// whether the CRD is installed. Never returns an error: an unreachable
    /// or absent schema both degrade to `schema_present: false`.
    pub async fn discover(client: Client, reader: Arc<dyn ClusterReader>) -> Self {
        let resource = volume_snapshot_resource();
        let api: Api<DynamicObject> = Api::all_with(client, &resource);
        let schema_present = match api.list(&ListParams::default().limit(1)).await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    error = %e,
                    "volume snapshot schema not detected; snapshot-aware checks disabled"
                );
                false
            }
        };
        Self {
            reader,
            schema_present,
        }
    }
}

#[async_trait]
impl SnapshotProbe for KubeSnapshotProbe {
    async fn has_ready_retain_snapshot(
        &self,
        namespace: &str,
        pvc_name: &str,
    ) -> Option<SnapshotDescriptor> {
        if !self.schema_present {
            return None;
        }

        let snapshots = match self.reader.list_snapshots(namespace).await {
            Ok(snapshots) => snapshots,
            Err(ReaderError::SchemaAbsent) => return None,
            Err(e) => {
                warn!(error = %e, namespace, pvc_name, "snapshot list failed; treating as no snapshot");
                return None;
            }
        };

        for snapshot in snapshots
            .iter()
            .filter(|s| s.source_pvc == pvc_name && s.ready)
        {
            let policy = match &snapshot.snapshot_class_name {
                Some(class_name) => self
                    .reader
                    .get_snapshot_class(class_name)
                    .await
                    .map(|c| c.deletion_policy)
                    .unwrap_or(DeletionPolicy::Unknown),
                None => DeletionPolicy::Unknown,
            };

            if policy == DeletionPolicy::Retain {
                return Some(SnapshotDescriptor {
                    name: snapshot.name.clone(),
                    namespace: snapshot.namespace.clone(),
                });
            }
        }

        None
    }
}
