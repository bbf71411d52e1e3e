//! Pure decision logic: given a PV, PVC, or namespace identifier, computes
//! whether deleting it is safe. The engine is reentrant and holds no mutable
//! state; it is safe to share one `RiskEngine` across concurrently-running
//! requests.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::warn;

use crate::error::{EngineError, ReaderError};
use crate::reader::{ClaimRef, ClusterReader, PvcPhase, ReclaimPolicy};
use crate::snapshot::SnapshotProbe;

/// Per-request budget for cluster reads, applied to each engine entry point
/// with `tokio::time::timeout`. Sits inside the 10-second transport budget
/// the external webhook registration imposes, leaving headroom for
/// serialisation and transit.
pub const DEFAULT_ENGINE_DEADLINE: Duration = Duration::from_secs(5);

/// A PVC found risky during assessment, carrying enough to both explain the
/// verdict and let an operator locate the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskyPvc {
    pub namespace: String,
    pub name: String,
    pub pv_name: String,
    pub reason: String,
    pub has_snapshot: bool,
    pub snapshot_name: Option<String>,
}

/// The direct-PV-deletion path has no claim to report on unless the PV still
/// carries a reference to its last bound claim; modelled as a distinct
/// variant rather than forcing it into `RiskyPvc`'s shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskyPv {
    pub pv_name: String,
    pub claim_ref: Option<ClaimRef>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskySubject {
    Pvc(RiskyPvc),
    Pv(RiskyPv),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskAssessment {
    pub risky: bool,
    pub risky_subjects: Vec<RiskySubject>,
    pub message: String,
    pub remediation: Option<String>,
}

impl RiskAssessment {
    fn safe(message: impl Into<String>) -> Self {
        Self {
            risky: false,
            risky_subjects: Vec::new(),
            message: message.into(),
            remediation: None,
        }
    }
}

pub struct RiskEngine {
    reader: Arc<dyn ClusterReader>,
    probe: Arc<dyn SnapshotProbe>,
}

impl RiskEngine {
    pub fn new(reader: Arc<dyn ClusterReader>, probe: Arc<dyn SnapshotProbe>) -> Self {
        Self { reader, probe }
    }

    async fn with_deadline<F, T>(&self, deadline: Duration, fut: F) -> Result<T, EngineError>
    where
        F: std::future::Future<Output = Result<T, EngineError>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::DeadlineExceeded(deadline)),
        }
    }

    /// §4.2 AssessPV.
    pub async fn assess_pv(
        &self,
        pv_name: &str,
        deadline: Duration,
    ) -> Result<RiskAssessment, EngineError> {
        self.with_deadline(deadline, self.assess_pv_inner(pv_name))
            .await
    }

    async fn assess_pv_inner(&self, pv_name: &str) -> Result<RiskAssessment, EngineError> {
        let pv = self.reader.get_pv(pv_name).await.map_err(EngineError::Reader)?;

        match pv.reclaim_policy {
            ReclaimPolicy::Retain => Ok(RiskAssessment::safe(format!(
                "PV '{pv_name}' has Retain reclaim policy"
            ))),
            ReclaimPolicy::Delete | ReclaimPolicy::Unknown => {
                let reason = format!(
                    "PV '{pv_name}' has {} reclaim policy",
                    pv.reclaim_policy
                );
                let risky_pv = RiskyPv {
                    pv_name: pv_name.to_string(),
                    claim_ref: pv.claim_ref.clone(),
                    reason: reason.clone(),
                };
                let message = crate::message::pv_blocked_message(pv_name, &pv.reclaim_policy, pv.claim_ref.as_ref());
                let remediation = crate::message::remediation_for_pv(pv_name);
                Ok(RiskAssessment {
                    risky: true,
                    risky_subjects: vec![RiskySubject::Pv(risky_pv)],
                    message,
                    remediation: Some(remediation),
                })
            }
        }
    }

    /// §4.2 AssessPVC.
    pub async fn assess_pvc(
        &self,
        namespace: &str,
        name: &str,
        deadline: Duration,
    ) -> Result<RiskAssessment, EngineError> {
        self.with_deadline(deadline, self.assess_pvc_inner(namespace, name))
            .await
    }

    async fn assess_pvc_inner(&self, namespace: &str, name: &str) -> Result<RiskAssessment, EngineError> {
        let pvc = self
            .reader
            .get_pvc(namespace, name)
            .await
            .map_err(EngineError::Reader)?;

        if pvc.phase != PvcPhase::Bound {
            return Ok(RiskAssessment::safe(format!(
                "PVC '{namespace}/{name}' is not bound"
            )));
        }

        let pv_name = match &pvc.volume_name {
            Some(v) => v.clone(),
            None => {
                return Ok(RiskAssessment::safe(format!(
                    "PVC '{namespace}/{name}' is not bound"
                )))
            }
        };

        let pv = self.reader.get_pv(&pv_name).await.map_err(EngineError::Reader)?;

        if pv.reclaim_policy == ReclaimPolicy::Retain {
            return Ok(RiskAssessment::safe(format!(
                "PVC '{namespace}/{name}' is bound to PV '{pv_name}' which has Retain reclaim policy"
            )));
        }

        if let Some(descriptor) = self.probe.has_ready_retain_snapshot(namespace, name).await {
            return Ok(RiskAssessment::safe(format!(
                "PVC '{namespace}/{name}' has a ready snapshot '{}' with a Retain-policy snapshot class",
                descriptor.name
            )));
        }

        let reason = format!(
            "PV '{pv_name}' has {} reclaim policy, no snapshot found",
            pv.reclaim_policy
        );
        let risky_pvc = RiskyPvc {
            namespace: namespace.to_string(),
            name: name.to_string(),
            pv_name: pv_name.clone(),
            reason: reason.clone(),
            has_snapshot: false,
            snapshot_name: None,
        };
        let message = crate::message::pvc_blocked_message(namespace, name, &pv_name, &reason);
        let remediation = crate::message::remediation_for_pvc(namespace, name, &[pv_name]);
        Ok(RiskAssessment {
            risky: true,
            risky_subjects: vec![RiskySubject::Pvc(risky_pvc)],
            message,
            remediation: Some(remediation),
        })
    }

    /// §4.2 AssessNamespace.
    pub async fn assess_namespace(
        &self,
        namespace: &str,
        deadline: Duration,
    ) -> Result<RiskAssessment, EngineError> {
        self.with_deadline(deadline, self.assess_namespace_inner(namespace))
            .await
    }

    async fn assess_namespace_inner(&self, namespace: &str) -> Result<RiskAssessment, EngineError> {
        let pvcs = self.reader.list_pvcs(namespace).await.map_err(EngineError::Reader)?;

        if pvcs.is_empty() {
            return Ok(RiskAssessment::safe(format!(
                "namespace '{namespace}' has no PVCs"
            )));
        }

        let bound: Vec<_> = pvcs.into_iter().filter(|p| p.phase == PvcPhase::Bound).collect();

        if bound.is_empty() {
            return Ok(RiskAssessment::safe(format!(
                "namespace '{namespace}' has no PVCs"
            )));
        }

        let evaluations = join_all(bound.iter().map(|pvc| async move {
            match self.assess_pvc_inner(&pvc.namespace, &pvc.name).await {
                Ok(assessment) => assessment,
                Err(e) => {
                    warn!(
                        namespace = %pvc.namespace,
                        pvc = %pvc.name,
                        error = %e,
                        "could not verify bound PV during namespace assessment; refusing"
                    );
                    let reason = "could not verify PV; refusing".to_string();
                    RiskAssessment {
                        risky: true,
                        risky_subjects: vec![RiskySubject::Pvc(RiskyPvc {
                            namespace: pvc.namespace.clone(),
                            name: pvc.name.clone(),
                            pv_name: pvc.volume_name.clone().unwrap_or_default(),
                            reason: reason.clone(),
                            has_snapshot: false,
                            snapshot_name: None,
                        })],
                        message: reason,
                        remediation: None,
                    }
                }
            }
        }))
        .await;

        let risky_pvcs: Vec<RiskyPvc> = evaluations
            .into_iter()
            .flat_map(|a| a.risky_subjects)
            .filter_map(|s| match s {
                RiskySubject::Pvc(p) => Some(p),
                RiskySubject::Pv(_) => None,
            })
            .collect();

        if risky_pvcs.is_empty() {
            return Ok(RiskAssessment::safe(format!(
                "namespace '{namespace}' has no PVCs at risk"
            )));
        }

        let message = crate::message::namespace_blocked_message(namespace, &risky_pvcs);
        let pv_names: Vec<String> = risky_pvcs
            .iter()
            .map(|p| p.pv_name.clone())
            .filter(|n| !n.is_empty())
            .collect();
        let remediation = crate::message::remediation_for_namespace(namespace, &pv_names);

        Ok(RiskAssessment {
            risky: true,
            risky_subjects: risky_pvcs.into_iter().map(RiskySubject::Pvc).collect(),
            message,
            remediation: Some(remediation),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{Pv, Pvc, Snapshot, SnapshotClass};
    use crate::snapshot::SnapshotDescriptor;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeReader {
        pvs: Mutex<HashMap<String, Pv>>,
        pvcs: Mutex<HashMap<(String, String), Pvc>>,
    }

    #[async_trait]
    impl ClusterReader for FakeReader {
        async fn get_pv(&self, name: &str) -> Result<Pv, ReaderError> {
            self.pvs
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| ReaderError::NotFound {
                    kind: "PersistentVolume",
                    name: name.to_string(),
                })
        }
        async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Pvc, ReaderError> {
            self.pvcs
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), name.to_string()))
                .cloned()
                .ok_or_else(|| ReaderError::NotFound {
                    kind: "PersistentVolumeClaim",
                    name: format!("{namespace}/{name}"),
                })
        }
        async fn list_pvcs(&self, namespace: &str) -> Result<Vec<Pvc>, ReaderError> {
            Ok(self
                .pvcs
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.namespace == namespace)
                .cloned()
                .collect())
        }
        async fn list_snapshots(&self, _namespace: &str) -> Result<Vec<Snapshot>, ReaderError> {
            Ok(Vec::new())
        }
        async fn get_snapshot_class(&self, _name: &str) -> Result<SnapshotClass, ReaderError> {
            Err(ReaderError::SchemaAbsent)
        }
    }

    struct FakeProbe {
        answers: Mutex<HashMap<(String, String), SnapshotDescriptor>>,
    }

    impl Default for FakeProbe {
        fn default() -> Self {
            Self {
                answers: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl SnapshotProbe for FakeProbe {
        async fn has_ready_retain_snapshot(
            &self,
            namespace: &str,
            pvc_name: &str,
        ) -> Option<SnapshotDescriptor> {
            self.answers
                .lock()
                .unwrap()
                .get(&(namespace.to_string(), pvc_name.to_string()))
                .cloned()
        }
    }

    fn engine(reader: FakeReader, probe: FakeProbe) -> RiskEngine {
        RiskEngine::new(Arc::new(reader), Arc::new(probe))
    }

    fn insert_pv(reader: &FakeReader, name: &str, policy: ReclaimPolicy, claim_ref: Option<ClaimRef>) {
        reader.pvs.lock().unwrap().insert(
            name.to_string(),
            Pv {
                name: name.to_string(),
                reclaim_policy: policy,
                claim_ref,
            },
        );
    }

    fn insert_bound_pvc(reader: &FakeReader, namespace: &str, name: &str, pv_name: &str) {
        reader.pvcs.lock().unwrap().insert(
            (namespace.to_string(), name.to_string()),
            Pvc {
                namespace: namespace.to_string(),
                name: name.to_string(),
                phase: PvcPhase::Bound,
                volume_name: Some(pv_name.to_string()),
            },
        );
    }

    #[tokio::test]
    async fn retain_pv_is_allowed() {
        let reader = FakeReader::default();
        insert_pv(&reader, "pv-1", ReclaimPolicy::Retain, None);
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_pv("pv-1", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!a.risky);
        assert!(a.message.contains("Retain"));
    }

    #[tokio::test]
    async fn delete_pv_is_risky_and_carries_claim_ref() {
        let reader = FakeReader::default();
        insert_pv(
            &reader,
            "pv-2",
            ReclaimPolicy::Delete,
            Some(ClaimRef {
                namespace: "prod".to_string(),
                name: "db".to_string(),
            }),
        );
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_pv("pv-2", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(a.risky);
        match &a.risky_subjects[0] {
            RiskySubject::Pv(p) => {
                assert_eq!(p.pv_name, "pv-2");
                assert_eq!(
                    p.claim_ref,
                    Some(ClaimRef {
                        namespace: "prod".to_string(),
                        name: "db".to_string()
                    })
                );
            }
            _ => panic!("expected a direct PV risky subject"),
        }
    }

    #[tokio::test]
    async fn unknown_reclaim_policy_fails_safe() {
        let reader = FakeReader::default();
        insert_pv(&reader, "pv-3", ReclaimPolicy::Unknown, None);
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_pv("pv-3", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(a.risky);
    }

    #[tokio::test]
    async fn pvc_bound_to_retain_pv_is_allowed() {
        let reader = FakeReader::default();
        insert_pv(&reader, "pv-1", ReclaimPolicy::Retain, None);
        insert_bound_pvc(&reader, "prod", "web", "pv-1");
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_pvc("prod", "web", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!a.risky);
    }

    #[tokio::test]
    async fn pvc_not_bound_is_allowed() {
        let reader = FakeReader::default();
        reader.pvcs.lock().unwrap().insert(
            ("prod".to_string(), "pending".to_string()),
            Pvc {
                namespace: "prod".to_string(),
                name: "pending".to_string(),
                phase: PvcPhase::Other("Pending".to_string()),
                volume_name: None,
            },
        );
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_pvc("prod", "pending", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!a.risky);
        assert!(a.message.contains("not bound"));
    }

    #[tokio::test]
    async fn pvc_delete_policy_without_snapshot_is_denied() {
        let reader = FakeReader::default();
        insert_pv(&reader, "pv-2", ReclaimPolicy::Delete, None);
        insert_bound_pvc(&reader, "prod", "db", "pv-2");
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_pvc("prod", "db", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(a.risky);
        assert!(a.message.contains("prod/db"));
        assert!(a.message.contains("no snapshot found"));
        let remediation = a.remediation.unwrap();
        assert!(remediation.contains("kubectl patch pv pv-2"));
        assert!(remediation.contains("pv-safe.io/force-delete=true"));
    }

    #[tokio::test]
    async fn pvc_with_retain_snapshot_is_allowed() {
        let reader = FakeReader::default();
        insert_pv(&reader, "pv-2", ReclaimPolicy::Delete, None);
        insert_bound_pvc(&reader, "prod", "db", "pv-2");
        let probe = FakeProbe::default();
        probe.answers.lock().unwrap().insert(
            ("prod".to_string(), "db".to_string()),
            SnapshotDescriptor {
                name: "snap-1".to_string(),
                namespace: "prod".to_string(),
            },
        );
        let engine = engine(reader, probe);

        let a = engine
            .assess_pvc("prod", "db", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!a.risky);
        assert!(a.message.contains("snap-1"));
    }

    #[tokio::test]
    async fn namespace_with_no_pvcs_is_allowed() {
        let reader = FakeReader::default();
        let engine = engine(reader, FakeProbe::default());

        let a = engine
            .assess_namespace("empty-ns", Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!a.risky);
        assert!(a.message.contains("no PVCs"));
    }

    #[tokio::test]
    async fn namespace_is_risky_iff_any_bound_pvc_is_risky() {
        let reader = FakeReader::default();
        insert_pv(&reader, "pv-a", ReclaimPolicy::Retain, None);
        insert_pv(&reader, "pv-b", ReclaimPolicy::Delete, None);
        insert_pv(&reader, "pv-c", ReclaimPolicy::Delete, None);
        insert_bound_pvc(&reader, "staging", "a", "pv-a");
        insert_bound_pvc(&reader, "staging", "b", "pv-b");
        insert_bound_pvc(&reader, "staging", "c", "pv-c");

        let probe = FakeProbe::default();
        probe.answers.lock().unwrap().insert(
            ("staging".to_string(), "c".to_string()),
            SnapshotDescriptor {
                name: "snap-c".to_string(),
                namespace: "staging".to_string(),
            },
        );

        let engine = engine(reader, probe);
        let a = engine
            .assess_namespace("staging", Duration::from_secs(1))
            .await
            .unwrap();

        assert!(a.risky);
        let risky_names: Vec<String> = a
            .risky_subjects
            .iter()
            .map(|s| match s {
                RiskySubject::Pvc(p) => p.name.clone(),
                RiskySubject::Pv(p) => p.pv_name.clone(),
            })
            .collect();
        assert_eq!(risky_names, vec!["b".to_string()]);
    }
}
