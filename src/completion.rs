//! Completion provider collaborator (§1 external dependencies): the LLM an
//! engine or the JSON extractor calls out to. A schema/prompt comes in, a
//! JSON value (or a refusal) comes back.
//!
//! Authentication scheme for talking to a real provider is a Non-goal
//! (§9); the trait and a deterministic in-memory test double are ambient
//! test tooling (DESIGN.md "Non-goals carried forward unchanged").

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransformError;
use crate::model::Action;

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn extract_json(
        &self,
        content: &str,
        schema: Option<&Value>,
        prompt: Option<&str>,
    ) -> Result<Value, TransformError>;

    /// §4.J "smart-scrape" variant: given the page content, decide whether
    /// interacting with the page (clicking, scrolling, waiting) would
    /// surface more extractable content before the real extraction runs.
    /// `Ok(None)` means "extract as-is" — the default for providers that
    /// don't support this variant.
    async fn plan_interaction(
        &self,
        _content: &str,
        _schema: Option<&Value>,
        _prompt: Option<&str>,
    ) -> Result<Option<Vec<Action>>, TransformError> {
        Ok(None)
    }
}

/// A deterministic stub used by tests: always returns a fixed value, or a
/// refusal if the content contains a sentinel string. Never talks to the
/// network.
pub struct StubCompletionProvider {
    pub response: Value,
    pub refuse_on: Option<String>,
    /// When set, any content containing this sentinel reports the cost
    /// limit as exceeded, as if the provider itself rejected the call for
    /// billing reasons rather than refusing the content.
    pub cost_limit_on: Option<String>,
    /// When set, `plan_interaction` returns this plan unconditionally
    /// instead of the default `Ok(None)`.
    pub interaction_plan: Option<Vec<Action>>,
}

impl StubCompletionProvider {
    pub fn always(response: Value) -> Self {
        StubCompletionProvider { response, refuse_on: None, cost_limit_on: None, interaction_plan: None }
    }
}

#[async_trait]
impl CompletionProvider for StubCompletionProvider {
    async fn extract_json(
        &self,
        content: &str,
        _schema: Option<&Value>,
        _prompt: Option<&str>,
    ) -> Result<Value, TransformError> {
        if let Some(sentinel) = &self.cost_limit_on {
            if content.contains(sentinel.as_str()) {
                return Err(TransformError::CostLimitExceeded);
            }
        }
        if let Some(sentinel) = &self.refuse_on {
            if content.contains(sentinel.as_str()) {
                return Err(TransformError::LlmRefusal);
            }
        }
        Ok(self.response.clone())
    }

    async fn plan_interaction(
        &self,
        _content: &str,
        _schema: Option<&Value>,
        _prompt: Option<&str>,
    ) -> Result<Option<Vec<Action>>, TransformError> {
        Ok(self.interaction_plan.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_returns_fixed_response() {
        let provider = StubCompletionProvider::always(serde_json::json!({"ok": true}));
        let result = provider.extract_json("anything", None, None).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn stub_refuses_on_sentinel() {
        let mut provider = StubCompletionProvider::always(serde_json::json!({}));
        provider.refuse_on = Some("nope".to_string());
        let err = provider.extract_json("contains nope here", None, None).await.unwrap_err();
        assert!(matches!(err, TransformError::LlmRefusal));
    }

    #[tokio::test]
    async fn stub_reports_cost_limit_exceeded_on_sentinel() {
        let mut provider = StubCompletionProvider::always(serde_json::json!({}));
        provider.cost_limit_on = Some("toopricey".to_string());
        let err = provider.extract_json("this is toopricey to extract", None, None).await.unwrap_err();
        assert!(matches!(err, TransformError::CostLimitExceeded));
    }

    #[tokio::test]
    async fn stub_plan_interaction_defaults_to_none() {
        let provider = StubCompletionProvider::always(serde_json::json!({}));
        let plan = provider.plan_interaction("content", None, None).await.unwrap();
        assert!(plan.is_none());
    }
}
