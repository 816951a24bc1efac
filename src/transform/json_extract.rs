//! JSON Extractor (§4.J): runs a schema/prompt-driven extraction over the
//! sanitized HTML via a [`CompletionProvider`], after normalizing the
//! caller's schema into a strict variant and trimming content to fit the
//! provider's token budget.
//!
//! The §4.J "smart-scrape" variant (ask the provider whether page
//! interaction would help before extracting, replay its action plan through
//! a browser engine, re-extract) is not implemented in this module: it
//! needs a live `Fetcher` to replay the action plan, which this module has
//! no access to. That step runs in `ScrapeOrchestrator::maybe_smart_scrape`
//! before the sanitized HTML ever reaches `extract` here, using
//! `CompletionProvider::plan_interaction`.

use serde_json::{Map, Value};

use crate::completion::CompletionProvider;
use crate::error::TransformError;
use crate::model::{CostTracking, JsonExtractOptions};

/// Stand-in for "model's max input tokens × 0.8" (§4.J): a real deployment
/// would read this from the completion provider's model card; we use a
/// fixed budget representative of a mid-size context window, documented
/// here rather than threaded through every call site.
const DEFAULT_TOKEN_BUDGET: usize = 100_000;

/// Never trim more than this fraction of the remaining content in one step
/// (§4.J "never removing more than 20% per step").
const MAX_TRIM_RATIO: f64 = 0.2;

/// Returns the extracted JSON value and, if the content had to be trimmed
/// to fit the token budget, a warning message the pipeline attaches to
/// `Document.warning` (§4.J.1 "emit warning on trim").
pub async fn extract(
    sanitized_html: &str,
    options: &JsonExtractOptions,
    provider: &dyn CompletionProvider,
    cost_tracking: &mut CostTracking,
) -> Result<(Value, Option<String>), TransformError> {
    if options.schema.is_none() && options.prompt.is_none() {
        return Err(TransformError::InvalidSchema(
            "jsonExtract requires a schema, a prompt, or both".to_string(),
        ));
    }

    let content = strip_tags_for_extraction(sanitized_html);
    let (trimmed, did_trim) = trim_to_budget(&content, DEFAULT_TOKEN_BUDGET);
    let warning = did_trim.then(|| {
        "content exceeded the extraction token budget and was trimmed".to_string()
    });

    let was_array_schema = options.schema.as_ref().is_some_and(is_bare_array_schema);
    let schema = options.schema.as_ref().map(normalize_schema);

    let result = provider
        .extract_json(&trimmed, schema.as_ref(), options.prompt.as_deref())
        .await?;
    cost_tracking.record_tokens(estimate_tokens(&trimmed) as u64);

    let result = if was_array_schema { unwrap_items(result) } else { result };
    Ok((result, warning))
}

/// Rough token estimate: ~4 characters per token, the usual ballpark
/// without a real tokenizer in scope here.
fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4).max(1)
}

/// Trims `content` iteratively, at most 20% of its remaining length per
/// step (§4.J.1), until it fits `budget` tokens. Returns the trimmed text
/// and whether any trimming happened (the caller surfaces that as a
/// document warning upstream).
fn trim_to_budget(content: &str, budget: usize) -> (String, bool) {
    if estimate_tokens(content) <= budget {
        return (content.to_string(), false);
    }

    let mut current = content.to_string();
    let mut trimmed_any = false;
    while estimate_tokens(&current) > budget {
        let keep_ratio = 1.0 - MAX_TRIM_RATIO;
        let target_len = ((current.chars().count() as f64) * keep_ratio).floor() as usize;
        if target_len == 0 || target_len >= current.chars().count() {
            break;
        }
        current = current.chars().take(target_len).collect();
        trimmed_any = true;
    }
    (current, trimmed_any)
}

/// `true` if `schema` is a bare JSON-Schema array (`{"type": "array", ...}`)
/// rather than an object — the shape §4.J.2 says gets wrapped before
/// sending to the provider and unwrapped again from the response.
fn is_bare_array_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("array")
}

/// Normalizes a user-supplied JSON Schema into the strict variant the
/// completion provider's structured-output mode expects (§4.J.2):
/// - every object gets `additionalProperties: false`
/// - every declared property becomes required
/// - a bare array schema is wrapped as `{type: object, properties: {items:
///   ARRAY}, required: ["items"]}`
/// - `default` keys are stripped (never sent to the provider)
///
/// A pure transformation — the caller's schema `Value` is never mutated in
/// place, only cloned and rebuilt (§9 REDESIGN FLAG "schema flexibility").
fn normalize_schema(schema: &Value) -> Value {
    if is_bare_array_schema(schema) {
        let items_schema = strip_defaults(&strict_object(schema));
        let mut properties = Map::new();
        properties.insert("items".to_string(), items_schema);
        let mut wrapped = Map::new();
        wrapped.insert("type".to_string(), Value::String("object".to_string()));
        wrapped.insert("properties".to_string(), Value::Object(properties));
        wrapped.insert("required".to_string(), Value::Array(vec![Value::String("items".to_string())]));
        wrapped.insert("additionalProperties".to_string(), Value::Bool(false));
        return Value::Object(wrapped);
    }

    strip_defaults(&strict_object(schema))
}

/// Recursively marks every object schema `additionalProperties: false` and
/// every declared property required.
fn strict_object(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = map.clone();
            out.remove("$schema");

            if let Some(Value::Object(properties)) = map.get("properties") {
                let required: Vec<Value> =
                    properties.keys().map(|k| Value::String(k.clone())).collect();
                out.insert("required".to_string(), Value::Array(required));

                let mut normalized_properties = Map::new();
                for (key, value) in properties {
                    normalized_properties.insert(key.clone(), strict_object(value));
                }
                out.insert("properties".to_string(), Value::Object(normalized_properties));
                out.insert("additionalProperties".to_string(), Value::Bool(false));
            }

            if let Some(items) = map.get("items") {
                out.insert("items".to_string(), strict_object(items));
            }

            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// Strips every `default` key from a (already strictness-normalized) schema
/// tree (§4.J.2 "strip default keys").
fn strip_defaults(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if key == "default" {
                    continue;
                }
                out.insert(key.clone(), strip_defaults(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_defaults).collect()),
        other => other.clone(),
    }
}

/// Unwraps the `{items: [...]}` envelope a bare-array schema request was
/// wrapped into (§4.J.5), so the caller sees the array they originally
/// asked for rather than the object it was smuggled inside.
fn unwrap_items(result: Value) -> Value {
    match result {
        Value::Object(mut map) => map.remove("items").unwrap_or(Value::Object(map)),
        other => other,
    }
}

fn strip_tags_for_extraction(html: &str) -> String {
    let parsed = scraper::Html::parse_document(html);
    parsed.root_element().text().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::StubCompletionProvider;

    #[tokio::test]
    async fn extracts_using_schema() {
        let provider = StubCompletionProvider::always(serde_json::json!({"title": "Hi"}));
        let options = JsonExtractOptions {
            schema: Some(serde_json::json!({"$schema": "draft-07", "type": "object", "properties": {"title": {"type": "string"}}})),
            prompt: None,
            system_prompt: None,
            smart_scrape: false,
        };
        let mut cost_tracking = CostTracking::default();
        let (result, warning) = extract("<p>Hi</p>", &options, &provider, &mut cost_tracking).await.unwrap();
        assert_eq!(result, serde_json::json!({"title": "Hi"}));
        assert!(warning.is_none());
        assert!(cost_tracking.spent_tokens() > 0);
    }

    #[tokio::test]
    async fn rejects_when_neither_schema_nor_prompt_present() {
        let provider = StubCompletionProvider::always(serde_json::json!({}));
        let options = JsonExtractOptions { schema: None, prompt: None, system_prompt: None, smart_scrape: false };
        let mut cost_tracking = CostTracking::default();
        let err = extract("<p>Hi</p>", &options, &provider, &mut cost_tracking).await.unwrap_err();
        assert!(matches!(err, TransformError::InvalidSchema(_)));
    }

    #[tokio::test]
    async fn prompt_alone_is_sufficient() {
        let provider = StubCompletionProvider::always(serde_json::json!({"ok": true}));
        let options = JsonExtractOptions {
            schema: None,
            prompt: Some("extract the title".to_string()),
            system_prompt: None,
            smart_scrape: false,
        };
        let mut cost_tracking = CostTracking::default();
        let (result, _) = extract("<p>Hi</p>", &options, &provider, &mut cost_tracking).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[test]
    fn normalize_schema_marks_properties_required_and_closed() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"title": {"type": "string"}, "price": {"type": "number", "default": 0}}
        });
        let normalized = normalize_schema(&schema);
        assert_eq!(normalized["additionalProperties"], Value::Bool(false));
        assert_eq!(normalized["required"], serde_json::json!(["title", "price"]));
        assert!(normalized["properties"]["price"].get("default").is_none());
    }

    #[test]
    fn normalize_schema_wraps_bare_array_schema() {
        let schema = serde_json::json!({"type": "array", "items": {"type": "string"}});
        let normalized = normalize_schema(&schema);
        assert_eq!(normalized["type"], "object");
        assert_eq!(normalized["required"], serde_json::json!(["items"]));
        assert_eq!(normalized["properties"]["items"]["type"], "string");
    }

    #[tokio::test]
    async fn array_schema_result_is_unwrapped_from_items_envelope() {
        let provider = StubCompletionProvider::always(serde_json::json!({"items": ["a", "b"]}));
        let options = JsonExtractOptions {
            schema: Some(serde_json::json!({"type": "array", "items": {"type": "string"}})),
            prompt: None,
            system_prompt: None,
            smart_scrape: false,
        };
        let mut cost_tracking = CostTracking::default();
        let (result, _) = extract("<p>a b</p>", &options, &provider, &mut cost_tracking).await.unwrap();
        assert_eq!(result, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn trim_to_budget_is_a_no_op_under_budget() {
        let (trimmed, did_trim) = trim_to_budget("short content", 1000);
        assert_eq!(trimmed, "short content");
        assert!(!did_trim);
    }

    #[test]
    fn trim_to_budget_shrinks_oversized_content_in_bounded_steps() {
        let content = "x".repeat(10_000);
        let (trimmed, did_trim) = trim_to_budget(&content, 100);
        assert!(did_trim);
        assert!(estimate_tokens(&trimmed) <= 100);
        assert!(trimmed.len() < content.len());
    }
}
