use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use super::{repair::parse_model_json, PipelineError};
use crate::clients::{ChatClient, ChatRequest};

/// One chat call bounded by `timeout`. Expiry is reported as
/// `PipelineError::Timeout` so callers can tell it apart from upstream
/// failures. Only this call is abandoned; siblings keep running.
pub async fn call_json_with_timeout<T: DeserializeOwned>(
    chat: &dyn ChatClient,
    request: &ChatRequest,
    timeout: Duration,
    label: &str,
) -> Result<T, PipelineError> {
    let raw = match tokio::time::timeout(timeout, chat.complete(request)).await {
        Ok(reply) => reply?,
        Err(_) => {
            warn!(label, after_secs = timeout.as_secs(), "chat call timed out");
            return Err(PipelineError::Timeout {
                label: label.to_string(),
                after: timeout,
            });
        }
    };
    parse_model_json(&raw).map_err(|e| PipelineError::repair(label, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{fake::upstream_down, ClientError};
    use async_trait::async_trait;
    use serde_json::Value;

    struct SlowChat(Duration);

    #[async_trait]
    impl ChatClient for SlowChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ClientError> {
            tokio::time::sleep(self.0).await;
            Ok("{\"ok\": true}".into())
        }
    }

    struct DownChat;

    #[async_trait]
    impl ChatClient for DownChat {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ClientError> {
            Err(upstream_down())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_a_timeout_error() {
        let chat = SlowChat(Duration::from_secs(90));
        let err = call_json_with_timeout::<Value>(
            &chat,
            &ChatRequest::json("plan monday"),
            Duration::from_secs(60),
            "day-plan:monday",
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "day-plan:monday timed out after 60s");
    }

    #[tokio::test(start_paused = true)]
    async fn fast_reply_is_parsed() {
        let chat = SlowChat(Duration::from_secs(1));
        let value: Value = call_json_with_timeout(
            &chat,
            &ChatRequest::json("x"),
            Duration::from_secs(60),
            "fast",
        )
        .await
        .unwrap();
        assert_eq!(value["ok"], true);
    }

    #[tokio::test]
    async fn upstream_errors_are_not_timeouts() {
        let err = call_json_with_timeout::<Value>(
            &DownChat,
            &ChatRequest::json("x"),
            Duration::from_secs(5),
            "down",
        )
        .await
        .unwrap_err();
        assert!(!err.is_timeout());
        assert!(matches!(err, PipelineError::Client(_)));
    }
}
