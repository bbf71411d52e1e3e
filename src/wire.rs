//! The admission envelope, modelled directly against the wire JSON rather
//! than through a generic CRD-typed admission crate — the same choice the
//! retrieval pack's own admission module (krator) makes. `old_object` stays
//! a `serde_json::Value` so bypass-label extraction works uniformly across
//! the three object kinds this gate mediates.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestKind {
    pub kind: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub operation: Operation,
    pub kind: RequestKind,
    #[serde(default)]
    pub namespace: Option<String>,
    pub name: String,
    #[serde(default)]
    pub user_info: UserInfo,
    #[serde(default)]
    pub old_object: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewRequest {
    pub api_version: String,
    pub kind: String,
    pub request: AdmissionRequest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    /// Wire key is "status", matching admission.k8s.io's `AdmissionResponse.Result`
    /// Go field (`json:"status,omitempty"`), exposed here as `result`.
    #[serde(rename = "status", skip_serializing_if = "Option::is_none")]
    pub result: Option<Status>,
}

impl AdmissionResponse {
    pub fn allow(uid: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let result = if message.is_empty() {
            None
        } else {
            Some(Status {
                status: "Success".to_string(),
                message: Some(message),
                reason: None,
                code: None,
            })
        };
        Self {
            uid: uid.into(),
            allowed: true,
            result,
        }
    }

    pub fn deny(uid: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            result: Some(Status {
                status: "Failure".to_string(),
                message: Some(message.into()),
                reason: Some("Forbidden".to_string()),
                code: Some(403),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}
