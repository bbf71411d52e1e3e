//! Process configuration, parsed from CLI flags or environment variables the
//! same way the rest of this stack's controllers do it.
//!
//! TLS material, certificate rotation, and `ValidatingWebhookConfiguration`
//! registration are handled by the cluster operator and the platform's cert
//! manager, not by this process.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "pv-safe-webhook", about = "Admission webhook guarding PV/PVC/Namespace deletes")]
pub struct WebhookConfig {
    /// Address the HTTP server binds to.
    #[arg(long, env = "PV_SAFE_BIND_ADDR", default_value = "0.0.0.0:8443")]
    pub bind_addr: String,

    /// Per-request deadline, in seconds, for a single risk assessment.
    #[arg(long, env = "PV_SAFE_DEADLINE_SECS", default_value_t = 5)]
    pub deadline_secs: u64,

    /// Log filter passed to `tracing_subscriber::EnvFilter`, e.g. "info,pv_safe=debug".
    #[arg(long, env = "PV_SAFE_LOG", default_value = "info")]
    pub log_filter: String,
}

impl WebhookConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}
