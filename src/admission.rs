//! State-free HTTP request handler: parses the admission envelope, checks
//! the bypass label, routes DELETE requests to the risk engine, and
//! serialises the verdict back. No cross-request state.

use std::time::Duration;

use tracing::{info, warn};

use crate::bypass::{check_bypass, BypassOutcome, BYPASS_LABEL_KEY, BYPASS_LABEL_VALUE};
use crate::engine::{RiskEngine, DEFAULT_ENGINE_DEADLINE};
use crate::wire::{AdmissionRequest, AdmissionResponse, AdmissionReviewRequest, AdmissionReviewResponse, Operation};

const KIND_NAMESPACE: &str = "Namespace";
const KIND_PVC: &str = "PersistentVolumeClaim";
const KIND_PV: &str = "PersistentVolume";

pub struct AdmissionAdapter {
    engine: RiskEngine,
    deadline: Duration,
}

impl AdmissionAdapter {
    pub fn new(engine: RiskEngine) -> Self {
        Self {
            engine,
            deadline: DEFAULT_ENGINE_DEADLINE,
        }
    }

    pub fn with_deadline(engine: RiskEngine, deadline: Duration) -> Self {
        Self { engine, deadline }
    }

    pub async fn review(&self, envelope: AdmissionReviewRequest) -> AdmissionReviewResponse {
        let req = envelope.request;
        let response = self.decide(&req).await;
        AdmissionReviewResponse {
            api_version: envelope.api_version,
            kind: envelope.kind,
            response,
        }
    }

    async fn decide(&self, req: &AdmissionRequest) -> AdmissionResponse {
        info!(
            uid = %req.uid,
            operation = ?req.operation,
            kind = %req.kind.kind,
            namespace = ?req.namespace,
            name = %req.name,
            user = %req.user_info.username,
            groups = ?req.user_info.groups,
            "admission request received"
        );

        if req.operation != Operation::Delete {
            return AdmissionResponse::allow(&req.uid, "Request allowed");
        }

        info!(
            uid = %req.uid,
            kind = %req.kind.kind,
            namespace = ?req.namespace,
            name = %req.name,
            "deletion requested"
        );

        if check_bypass(&req.old_object) == BypassOutcome::Bypass {
            warn!(
                event = "BYPASS",
                uid = %req.uid,
                kind = %req.kind.kind,
                namespace = ?req.namespace,
                name = %req.name,
                user = %req.user_info.username,
                "bypass label present; allowing deletion unconditionally"
            );
            return AdmissionResponse::allow(
                &req.uid,
                format!("allowed via bypass label '{BYPASS_LABEL_KEY}={BYPASS_LABEL_VALUE}'"),
            );
        }

        let assessment = match req.kind.kind.as_str() {
            KIND_NAMESPACE => self.engine.assess_namespace(&req.name, self.deadline).await,
            KIND_PVC => match req.namespace.as_deref() {
                Some(ns) => self.engine.assess_pvc(ns, &req.name, self.deadline).await,
                None => {
                    return AdmissionResponse::allow(
                        &req.uid,
                        "missing namespace on PersistentVolumeClaim delete request; allowing",
                    )
                }
            },
            KIND_PV => self.engine.assess_pv(&req.name, self.deadline).await,
            _ => return AdmissionResponse::allow(&req.uid, "Request allowed"),
        };

        match assessment {
            Err(e) => {
                warn!(uid = %req.uid, error = %e, "risk assessment error; allowing");
                AdmissionResponse::allow(&req.uid, format!("risk assessment error (allowed): {e}"))
            }
            Ok(a) if !a.risky => AdmissionResponse::allow(&req.uid, a.message),
            Ok(a) => {
                warn!(
                    event = "DENY",
                    uid = %req.uid,
                    kind = %req.kind.kind,
                    namespace = ?req.namespace,
                    name = %req.name,
                    user = %req.user_info.username,
                    "denying deletion"
                );
                let mut message = a.message;
                if let Some(remediation) = a.remediation {
                    message.push_str("\n\n");
                    message.push_str(&remediation);
                }
                AdmissionResponse::deny(&req.uid, message)
            }
        }
    }
}
