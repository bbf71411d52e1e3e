//! Error taxonomy for the read path and the risk engine.
//!
//! `ReaderError` is what `ClusterReader`/`SnapshotProbe` implementations produce;
//! `EngineError` is what the `RiskEngine` surfaces to the admission adapter. The
//! adapter converts any `EngineError` into an allow-with-explanation response
//! (fail-open at the engine boundary) rather than matching on variants, so new
//! error causes never need adapter-side changes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("snapshot schema is not installed in this cluster")]
    SchemaAbsent,

    #[error("cluster API read failed: {0}")]
    Transport(#[from] kube::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("risk assessment did not complete within the {0:?} deadline")]
    DeadlineExceeded(std::time::Duration),
}
