//! Detects the bypass opt-out label on the object being deleted.
//!
//! The label is read from the prior-object bytes carried in the admission
//! envelope. A malformed prior object is a soft failure: it is logged and
//! treated as "no bypass", never as a reason to reject the whole request.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use tracing::warn;

pub const BYPASS_LABEL_KEY: &str = "pv-safe.io/force-delete";
pub const BYPASS_LABEL_VALUE: &str = "true";

#[derive(Debug, Deserialize)]
struct LabelledObject {
    #[serde(default)]
    metadata: ObjectMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassOutcome {
    Bypass,
    NoBypass,
}

pub fn check_bypass(old_object: &Option<serde_json::Value>) -> BypassOutcome {
    let Some(raw) = old_object else {
        return BypassOutcome::NoBypass;
    };

    let parsed = match serde_json::from_value::<LabelledObject>(raw.clone()) {
        Ok(obj) => obj,
        Err(e) => {
            warn!(error = %e, "failed to parse prior object for bypass check; assuming no bypass");
            return BypassOutcome::NoBypass;
        }
    };

    let has_bypass = parsed
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(BYPASS_LABEL_KEY))
        .map(|v| v == BYPASS_LABEL_VALUE)
        .unwrap_or(false);

    if has_bypass {
        BypassOutcome::Bypass
    } else {
        BypassOutcome::NoBypass
    }
}
