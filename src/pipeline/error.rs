use std::time::Duration;

use crate::clients::ClientError;

use super::repair::RepairError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{label} timed out after {}s", .after.as_secs())]
    Timeout { label: String, after: Duration },
    #[error("{label} failed after {attempts} attempts: {source}")]
    Exhausted {
        label: String,
        attempts: u32,
        #[source]
        source: ClientError,
    },
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("{label}: {source}")]
    Repair {
        label: String,
        #[source]
        source: RepairError,
    },
    #[error("{0}")]
    Upstream(String),
}

impl PipelineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }

    pub fn repair(label: impl Into<String>, source: RepairError) -> Self {
        PipelineError::Repair {
            label: label.into(),
            source,
        }
    }
}
