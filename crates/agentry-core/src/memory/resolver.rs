//! Reference resolution for tool parameters.
//!
//! Tool parameters may carry `{{ ... }}` tokens that stand in for session
//! memory: the scratchpad, the blackboard, named attributes, or artifacts.
//! Resolution walks the parameter JSON and substitutes tokens inside
//! string leaves only; keys, numbers, and booleans are never touched.
//! Unknown tokens are left verbatim so the tool (or the model, on the
//! next iteration) can see exactly what failed to resolve.

use agentry_types::artifact::Artifact;
use serde_json::Value;
use uuid::Uuid;

use super::store::MemoryStore;

/// Resolves `{{ ... }}` reference tokens against one session's memory.
///
/// Borrowed views only; the resolver never mutates memory.
pub struct ReferenceResolver<'a> {
    memory: &'a MemoryStore,
    artifacts: &'a [Artifact],
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(memory: &'a MemoryStore, artifacts: &'a [Artifact]) -> Self {
        Self { memory, artifacts }
    }

    /// Resolve every string leaf of `params`, returning a new value.
    pub fn resolve(&self, params: &Value) -> Value {
        match params {
            Value::String(s) => Value::String(self.resolve_text(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.resolve(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Substitute tokens inside one string. Text outside tokens is copied
    /// through unchanged.
    pub fn resolve_text(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find("{{") {
            let after_open = &rest[open + 2..];
            let Some(close) = after_open.find("}}") else {
                // Unterminated token, keep the tail as-is.
                break;
            };

            out.push_str(&rest[..open]);
            let raw = &after_open[..close];
            match self.expand(raw.trim()) {
                Some(expansion) => out.push_str(&expansion),
                None => {
                    // Unknown reference stays verbatim.
                    out.push_str("{{");
                    out.push_str(raw);
                    out.push_str("}}");
                }
            }
            rest = &after_open[close + 2..];
        }

        out.push_str(rest);
        out
    }

    fn expand(&self, token: &str) -> Option<String> {
        match token {
            "scratchpad" => Some(self.memory.scratchpad().to_string()),
            "blackboard" => Some(self.memory.render_blackboard(None)),
            "attrs" => serde_json::to_string_pretty(&self.memory.attributes_blob()).ok(),
            "artifacts" => self.all_artifacts_blob(),
            _ => {
                if let Some(name) = token.strip_prefix("attr.") {
                    self.attribute_text(name)
                } else if let Some(id) = token.strip_prefix("artifact.") {
                    self.artifact_content(id)
                } else {
                    None
                }
            }
        }
    }

    fn attribute_text(&self, name: &str) -> Option<String> {
        let attribute = self.memory.get_attribute(name)?;
        Some(match &attribute.value {
            // String values substitute raw, without JSON quoting.
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    fn artifact_content(&self, id: &str) -> Option<String> {
        let id = Uuid::parse_str(id).ok()?;
        self.artifacts
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.content.clone())
    }

    fn all_artifacts_blob(&self) -> Option<String> {
        let blob: Vec<Value> = self
            .artifacts
            .iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "kind": a.kind,
                    "title": a.title,
                    "content": a.content,
                })
            })
            .collect();
        serde_json::to_string_pretty(&Value::Array(blob)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_types::memory::{BlackboardCategory, BlackboardEntry};
    use serde_json::json;

    fn store_with_attr(name: &str, value: Value) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set_attribute(name, "test_tool", value, 1);
        store
    }

    #[test]
    fn scratchpad_token_substitutes() {
        let mut store = MemoryStore::new();
        store.set_scratchpad("working notes");
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!({"text": "notes: {{ scratchpad }}"}));
        assert_eq!(resolved["text"], "notes: working notes");
    }

    #[test]
    fn attr_token_substitutes_string_raw() {
        let store = store_with_attr("city", json!("Lisbon"));
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!({"q": "weather in {{ attr.city }}"}));
        assert_eq!(resolved["q"], "weather in Lisbon");
    }

    #[test]
    fn attr_token_serializes_non_string_values() {
        let store = store_with_attr("counts", json!([1, 2, 3]));
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!({"q": "data={{ attr.counts }}"}));
        assert_eq!(resolved["q"], "data=[1,2,3]");
    }

    #[test]
    fn unknown_token_left_verbatim() {
        let store = MemoryStore::new();
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!({"q": "see {{ attr.missing }} here"}));
        assert_eq!(resolved["q"], "see {{ attr.missing }} here");
    }

    #[test]
    fn non_string_leaves_untouched() {
        let store = MemoryStore::new();
        let resolver = ReferenceResolver::new(&store, &[]);

        let params = json!({"n": 42, "flag": true, "nested": {"x": null}});
        assert_eq!(resolver.resolve(&params), params);
    }

    #[test]
    fn tokens_resolve_in_nested_arrays_and_objects() {
        let store = store_with_attr("target", json!("alpha"));
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!({
            "list": ["{{ attr.target }}", "literal"],
            "inner": {"v": "{{ attr.target }}"}
        }));
        assert_eq!(resolved["list"][0], "alpha");
        assert_eq!(resolved["list"][1], "literal");
        assert_eq!(resolved["inner"]["v"], "alpha");
    }

    #[test]
    fn blackboard_token_renders_entries() {
        let mut store = MemoryStore::new();
        store.append_blackboard(BlackboardEntry::new(
            BlackboardCategory::Insight,
            "prices rose",
            1,
        ));
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!({"ctx": "{{ blackboard }}"}));
        let text = resolved["ctx"].as_str().unwrap();
        assert!(text.contains("prices rose"));
        assert!(text.contains("insight"));
    }

    #[test]
    fn artifact_token_substitutes_content() {
        let store = MemoryStore::new();
        let artifact = Artifact::new("report", "Summary", "full report text", 2);
        let token = format!("{{{{ artifact.{} }}}}", artifact.id);
        let artifacts = vec![artifact];
        let resolver = ReferenceResolver::new(&store, &artifacts);

        let resolved = resolver.resolve(&json!({"body": token}));
        assert_eq!(resolved["body"], "full report text");
    }

    #[test]
    fn artifacts_token_lists_all() {
        let store = MemoryStore::new();
        let artifacts = vec![
            Artifact::new("report", "First", "aaa", 1),
            Artifact::new("table", "Second", "bbb", 2),
        ];
        let resolver = ReferenceResolver::new(&store, &artifacts);

        let resolved = resolver.resolve(&json!({"all": "{{ artifacts }}"}));
        let text = resolved["all"].as_str().unwrap();
        assert!(text.contains("First"));
        assert!(text.contains("Second"));
    }

    #[test]
    fn multiple_tokens_in_one_string() {
        let mut store = MemoryStore::new();
        store.set_scratchpad("pad");
        store.set_attribute("k", "t", json!("v"), 0);
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!("{{ scratchpad }}-{{ attr.k }}"));
        assert_eq!(resolved, "pad-v");
    }

    #[test]
    fn unterminated_token_kept_as_is() {
        let store = MemoryStore::new();
        let resolver = ReferenceResolver::new(&store, &[]);

        let resolved = resolver.resolve(&json!("open {{ scratchpad"));
        assert_eq!(resolved, "open {{ scratchpad");
    }
}
