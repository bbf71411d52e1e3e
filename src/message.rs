//! Formats the human-facing headline and remediation text for a blocked
//! deletion. Templates only interpolate identifiers the caller actually
//! observed — this module never invents a PV or PVC name.

use crate::engine::RiskyPvc;
use crate::reader::{ClaimRef, ReclaimPolicy};

const BYPASS_LABEL_KEY: &str = "pv-safe.io/force-delete";
const BYPASS_LABEL_VALUE: &str = "true";

pub fn pv_blocked_message(
    pv_name: &str,
    policy: &ReclaimPolicy,
    claim_ref: Option<&ClaimRef>,
) -> String {
    let mut message = format!(
        "DELETION BLOCKED: PV '{pv_name}' has {policy} reclaim policy; deleting it destroys the backing storage"
    );
    if let Some(claim) = claim_ref {
        message.push_str(&format!(
            ". Previously bound to claim '{}/{}'",
            claim.namespace, claim.name
        ));
    }
    message
}

pub fn pvc_blocked_message(namespace: &str, name: &str, pv_name: &str, reason: &str) -> String {
    format!("DELETION BLOCKED: PVC '{namespace}/{name}': {reason} (bound PV '{pv_name}')")
}

pub fn namespace_blocked_message(namespace: &str, risky_pvcs: &[RiskyPvc]) -> String {
    let mut message = format!(
        "DELETION BLOCKED: namespace '{namespace}' has {} PVC(s) at risk",
        risky_pvcs.len()
    );
    message.push_str("\nRisky PVCs:");
    for pvc in risky_pvcs {
        message.push_str(&format!(
            "\n  - {}/{} (PV '{}'): {}",
            pvc.namespace, pvc.name, pvc.pv_name, pvc.reason
        ));
    }
    message
}

fn bypass_alternative(object_kind: &str, namespace: Option<&str>, name: &str) -> String {
    let label_cmd = match namespace {
        Some(ns) => format!(
            "kubectl label {object_kind} {name} -n {ns} {BYPASS_LABEL_KEY}={BYPASS_LABEL_VALUE} --overwrite"
        ),
        None => format!(
            "kubectl label {object_kind} {name} {BYPASS_LABEL_KEY}={BYPASS_LABEL_VALUE} --overwrite"
        ),
    };
    format!(
        "(3) Force delete anyway: label the object with '{BYPASS_LABEL_KEY}={BYPASS_LABEL_VALUE}' then delete it again.\n      {label_cmd}"
    )
}

fn reclaim_policy_alternative(pv_names: &[String]) -> String {
    if pv_names.is_empty() {
        return "(2) Change the PV's reclaim policy to Retain before deleting.".to_string();
    }
    let mut lines = vec!["(2) Change the reclaim policy to Retain before deleting:".to_string()];
    for pv in pv_names {
        lines.push(format!(
            "      kubectl patch pv {pv} -p '{{\"spec\":{{\"persistentVolumeReclaimPolicy\":\"Retain\"}}}}'"
        ));
    }
    lines.join("\n")
}

const SNAPSHOT_ALTERNATIVE: &str =
    "(1) Create a volume snapshot with a Retain-policy snapshot class before deleting.";

pub fn remediation_for_pv(pv_name: &str) -> String {
    [
        SNAPSHOT_ALTERNATIVE.to_string(),
        reclaim_policy_alternative(&[pv_name.to_string()]),
        bypass_alternative("pv", None, pv_name),
    ]
    .join("\n")
}

pub fn remediation_for_pvc(namespace: &str, name: &str, pv_names: &[String]) -> String {
    [
        SNAPSHOT_ALTERNATIVE.to_string(),
        reclaim_policy_alternative(pv_names),
        bypass_alternative("pvc", Some(namespace), name),
    ]
    .join("\n")
}

pub fn remediation_for_namespace(namespace: &str, pv_names: &[String]) -> String {
    [
        SNAPSHOT_ALTERNATIVE.to_string(),
        reclaim_policy_alternative(pv_names),
        bypass_alternative("namespace", None, namespace),
    ]
    .join("\n")
}
