//! The meal-generation pipeline: discovery, menus, selection, nutrition,
//! synthesis, merge, restriction screening and images, run in that order by
//! [`sequencer`].

pub mod discovery;
pub mod error;
pub mod fallback;
pub mod images;
pub mod menus;
pub mod merge;
pub mod nutrition;
pub mod plan_check;
pub mod prompts;
pub mod repair;
pub mod restrictions;
pub mod retry;
pub mod selection;
pub mod sequencer;
pub mod synthesis;
pub mod timeout;
pub mod types;

use serde::de::DeserializeOwned;

use crate::{
    clients::{ChatRequest, Clients},
    config::PipelineConfig,
};

pub use error::PipelineError;
use repair::parse_model_json;
use retry::{with_retry, RetryOutcome, RetryPolicy};
pub use sequencer::{run_pipeline, run_restaurant_stages, PipelineOutcome};

/// Clients plus tuning; cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct Pipeline {
    pub clients: Clients,
    pub config: PipelineConfig,
}

impl Pipeline {
    pub fn new(clients: Clients, config: PipelineConfig) -> Self {
        Self { clients, config }
    }

    pub fn policy(&self, preset: RetryPolicy) -> RetryPolicy {
        preset.with_delay_override(self.config.retry_delay_override)
    }

    /// Retry-wrapped chat call whose reply is repaired and decoded as `T`.
    /// A reply that cannot be repaired counts as a failed attempt.
    pub async fn chat_json<T: DeserializeOwned>(
        &self,
        request: &ChatRequest,
        label: &str,
    ) -> Result<T, PipelineError> {
        let outcome = with_retry(self.policy(RetryPolicy::CHAT), label, || async move {
            let raw = self.clients.chat.complete(request).await?;
            parse_model_json::<T>(&raw).map_err(|e| PipelineError::repair(label, e))
        })
        .await;
        match outcome {
            RetryOutcome::Success { data, .. } => Ok(data),
            RetryOutcome::Failure {
                error: PipelineError::Client(source),
                attempts,
            } => Err(PipelineError::Exhausted {
                label: label.to_string(),
                attempts,
                source,
            }),
            RetryOutcome::Failure { error, .. } => Err(error),
        }
    }
}
