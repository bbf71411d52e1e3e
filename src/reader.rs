//! Read-only capability over the platform API.
//!
//! `ClusterReader` is the only way the rest of the crate touches cluster state.
//! Every method is a single round-trip with no internal retry; retry/timeout
//! policy belongs to the caller (the risk engine applies a deadline, see
//! `engine.rs`). PV/PVC are read through their typed `k8s-openapi` shapes;
//! snapshots and snapshot classes are read dynamically because the CRDs that
//! define them may not be installed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use kube::api::{Api, ListParams};
use kube::core::DynamicObject;
use kube::discovery::ApiResource;
use kube::{Client, ResourceExt};

use crate::error::ReaderError;

/// Per-PV reclaim policy. `Unknown` covers unset and any value this crate
/// does not recognise; it is deliberately not treated as `Retain`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimPolicy {
    Retain,
    Delete,
    Unknown,
}

impl ReclaimPolicy {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Retain") => ReclaimPolicy::Retain,
            Some("Delete") => ReclaimPolicy::Delete,
            _ => ReclaimPolicy::Unknown,
        }
    }
}

impl std::fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReclaimPolicy::Retain => write!(f, "Retain"),
            ReclaimPolicy::Delete => write!(f, "Delete"),
            ReclaimPolicy::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Snapshot-class deletion policy. Same `Unknown`-is-not-safe treatment as
/// `ReclaimPolicy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPolicy {
    Retain,
    Delete,
    Unknown,
}

impl DeletionPolicy {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Retain") => DeletionPolicy::Retain,
            Some("Delete") => DeletionPolicy::Delete,
            _ => DeletionPolicy::Unknown,
        }
    }
}

/// The claim a PV was bound to before it was released, carried so an operator
/// can locate the original workload after a direct PV deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRef {
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Pv {
    pub name: String,
    pub reclaim_policy: ReclaimPolicy,
    pub claim_ref: Option<ClaimRef>,
}

/// PVC phase. Only `Bound` changes engine behaviour; every other phase
/// (Pending, Lost, or anything future versions of the API introduce) is kept
/// verbatim for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PvcPhase {
    Bound,
    Other(String),
}

impl PvcPhase {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Bound") => PvcPhase::Bound,
            Some(other) => PvcPhase::Other(other.to_string()),
            None => PvcPhase::Other("Unknown".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pvc {
    pub namespace: String,
    pub name: String,
    pub phase: PvcPhase,
    pub volume_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub name: String,
    pub namespace: String,
    pub source_pvc: String,
    pub ready: bool,
    pub snapshot_class_name: Option<String>,
    pub creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SnapshotClass {
    pub name: String,
    pub deletion_policy: DeletionPolicy,
}

/// Read-only capability over the platform API. See module docs.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    async fn get_pv(&self, name: &str) -> Result<Pv, ReaderError>;
    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Pvc, ReaderError>;
    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<Pvc>, ReaderError>;
    async fn list_snapshots(&self, namespace: &str) -> Result<Vec<Snapshot>, ReaderError>;
    async fn get_snapshot_class(&self, name: &str) -> Result<SnapshotClass, ReaderError>;
}

pub(crate) fn volume_snapshot_resource() -> ApiResource {
    ApiResource {
        group: "snapshot.storage.k8s.io".to_string(),
        version: "v1".to_string(),
        api_version: "snapshot.storage.k8s.io/v1".to_string(),
        kind: "VolumeSnapshot".to_string(),
        plural: "volumesnapshots".to_string(),
    }
}

pub(crate) fn volume_snapshot_class_resource() -> ApiResource {
    ApiResource {
        group: "snapshot.storage.k8s.io".to_string(),
        version: "v1".to_string(),
        api_version: "snapshot.storage.k8s.io/v1".to_string(),
        kind: "VolumeSnapshotClass".to_string(),
        plural: "volumesnapshotclasses".to_string(),
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

/// `ClusterReader` backed by a real `kube::Client`.
pub struct KubeClusterReader {
    client: Client,
}

impl KubeClusterReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn pv_from_api(pv: PersistentVolume) -> Pv {
    let name = pv.name_any();
    let spec = pv.spec.unwrap_or_default();
    let reclaim_policy = ReclaimPolicy::parse(spec.persistent_volume_reclaim_policy.as_deref());
    let claim_ref = spec.claim_ref.and_then(|r| {
        Some(ClaimRef {
            namespace: r.namespace?,
            name: r.name?,
        })
    });
    Pv {
        name,
        reclaim_policy,
        claim_ref,
    }
}

fn pvc_from_api(pvc: PersistentVolumeClaim) -> Pvc {
    let namespace = pvc.namespace().unwrap_or_default();
    let name = pvc.name_any();
    let status = pvc.status.unwrap_or_default();
    let phase = PvcPhase::parse(status.phase.as_deref());
    let volume_name = pvc.spec.and_then(|s| s.volume_name);
    Pvc {
        namespace,
        name,
        phase,
        volume_name,
    }
}

fn snapshot_from_dynamic(obj: DynamicObject) -> Option<Snapshot> {
    let namespace = obj.namespace()?;
    let name = obj.name_any();
    let source_pvc = obj
        .data
        .get("spec")?
        .get("source")?
        .get("persistentVolumeClaimName")?
        .as_str()?
        .to_string();
    let ready = obj
        .data
        .get("status")
        .and_then(|s| s.get("readyToUse"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let snapshot_class_name = obj
        .data
        .get("spec")
        .and_then(|s| s.get("volumeSnapshotClassName"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let creation_timestamp = obj
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|t| t.0);
    Some(Snapshot {
        name,
        namespace,
        source_pvc,
        ready,
        snapshot_class_name,
        creation_timestamp,
    })
}

fn snapshot_class_from_dynamic(obj: DynamicObject) -> SnapshotClass {
    let name = obj.name_any();
    let deletion_policy = DeletionPolicy::parse(obj.data.get("deletionPolicy").and_then(|v| v.as_str()));
    SnapshotClass {
        name,
        deletion_policy,
    }
}

#[async_trait]
impl ClusterReader for KubeClusterReader {
    async fn get_pv(&self, name: &str) -> Result<Pv, ReaderError> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        let pv = api.get(name).await.map_err(|e| {
            if is_not_found(&e) {
                ReaderError::NotFound {
                    kind: "PersistentVolume",
                    name: name.to_string(),
                }
            } else {
                ReaderError::Transport(e)
            }
        })?;
        Ok(pv_from_api(pv))
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Pvc, ReaderError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let pvc = api.get(name).await.map_err(|e| {
            if is_not_found(&e) {
                ReaderError::NotFound {
                    kind: "PersistentVolumeClaim",
                    name: format!("{namespace}/{name}"),
                }
            } else {
                ReaderError::Transport(e)
            }
        })?;
        Ok(pvc_from_api(pvc))
    }

    async fn list_pvcs(&self, namespace: &str) -> Result<Vec<Pvc>, ReaderError> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(ReaderError::Transport)?;
        Ok(list.items.into_iter().map(pvc_from_api).collect())
    }

    async fn list_snapshots(&self, namespace: &str) -> Result<Vec<Snapshot>, ReaderError> {
        let resource = volume_snapshot_resource();
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &resource);
        let list = api.list(&ListParams::default()).await.map_err(|e| {
            if is_not_found(&e) {
                ReaderError::SchemaAbsent
            } else {
                ReaderError::Transport(e)
            }
        })?;
        Ok(list
            .items
            .into_iter()
            .filter_map(snapshot_from_dynamic)
            .collect())
    }

    async fn get_snapshot_class(&self, name: &str) -> Result<SnapshotClass, ReaderError> {
        let resource = volume_snapshot_class_resource();
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);
        let obj = api.get(name).await.map_err(|e| {
            if is_not_found(&e) {
                ReaderError::NotFound {
                    kind: "VolumeSnapshotClass",
                    name: name.to_string(),
                }
            } else {
                ReaderError::Transport(e)
            }
        })?;
        Ok(snapshot_class_from_dynamic(obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reclaim_policy_unknown_is_not_retain() {
        assert_eq!(ReclaimPolicy::parse(None), ReclaimPolicy::Unknown);
        assert_eq!(ReclaimPolicy::parse(Some("Recycle")), ReclaimPolicy::Unknown);
        assert_eq!(ReclaimPolicy::parse(Some("Retain")), ReclaimPolicy::Retain);
    }

    #[test]
    fn deletion_policy_unknown_is_not_retain() {
        assert_eq!(DeletionPolicy::parse(None), DeletionPolicy::Unknown);
        assert_eq!(DeletionPolicy::parse(Some("Delete")), DeletionPolicy::Delete);
    }

    #[test]
    fn pvc_phase_preserves_unrecognised_phase_text() {
        assert_eq!(PvcPhase::parse(Some("Lost")), PvcPhase::Other("Lost".to_string()));
        assert_eq!(PvcPhase::parse(Some("Bound")), PvcPhase::Bound);
    }
}
