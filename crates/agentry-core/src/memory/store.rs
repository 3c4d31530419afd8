//! Memory store operations over the three session memory tiers.
//!
//! `MemoryStore` wraps a `SessionMemory` and enforces the tier invariants:
//! the blackboard is append-only and order-preserving, the scratchpad is
//! fully replaced on each write, and named attributes are unique by name
//! with last-writer-wins overwrites. All operations are synchronous and
//! effective immediately for the next step in the same iteration.

use agentry_types::memory::{BlackboardEntry, NamedAttribute, SessionMemory};
use chrono::Utc;
use serde_json::{Map, Value};

/// Read/append interface over one session's memory tiers.
///
/// Logically owned by the session; the engine exposes it to the tool
/// dispatcher and reference resolver by shared reference, never as a
/// mutable alias.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    memory: SessionMemory,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing memory snapshot (e.g. a loaded session's).
    pub fn from_memory(memory: SessionMemory) -> Self {
        Self { memory }
    }

    /// Consume the store, returning the memory tiers for persistence.
    pub fn into_memory(self) -> SessionMemory {
        self.memory
    }

    /// Borrow the underlying memory tiers.
    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    /// Append an entry to the blackboard. O(1), preserves order.
    pub fn append_blackboard(&mut self, entry: BlackboardEntry) {
        self.memory.blackboard.push(entry);
    }

    /// The full blackboard, in creation order.
    pub fn blackboard(&self) -> &[BlackboardEntry] {
        &self.memory.blackboard
    }

    /// Replace the scratchpad contents entirely.
    pub fn set_scratchpad(&mut self, text: impl Into<String>) {
        self.memory.scratchpad = text.into();
    }

    /// Append to the scratchpad (used when merging child sessions).
    pub fn append_scratchpad(&mut self, text: &str) {
        self.memory.scratchpad.push_str(text);
    }

    pub fn scratchpad(&self) -> &str {
        &self.memory.scratchpad
    }

    /// Upsert a named attribute from a tool result. Last writer wins.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        tool: impl Into<String>,
        value: Value,
        iteration: u32,
    ) {
        let name = name.into();
        let size = serde_json::to_string(&value).map(|s| s.len()).unwrap_or(0);
        let attribute = NamedAttribute {
            name: name.clone(),
            tool: tool.into(),
            value,
            size,
            iteration,
            created_at: Utc::now(),
        };

        match self.memory.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => *existing = attribute,
            None => self.memory.attributes.push(attribute),
        }
    }

    pub fn get_attribute(&self, name: &str) -> Option<&NamedAttribute> {
        self.memory.attributes.iter().find(|a| a.name == name)
    }

    /// Names of all attributes, in insertion order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.memory
            .attributes
            .iter()
            .map(|a| a.name.clone())
            .collect()
    }

    /// Render the blackboard as one text block per entry, each headed by
    /// its iteration number and category.
    ///
    /// `window` limits rendering to the most recent N entries; `None`
    /// renders everything.
    pub fn render_blackboard(&self, window: Option<usize>) -> String {
        let entries = &self.memory.blackboard;
        let skip = match window {
            Some(n) if entries.len() > n => entries.len() - n,
            _ => 0,
        };

        let mut out = String::new();
        for entry in &entries[skip..] {
            out.push_str(&format!(
                "[iteration {} | {}]\n{}\n\n",
                entry.iteration,
                entry.category.as_str(),
                entry.content
            ));
        }
        out.trim_end().to_string()
    }

    /// All attributes as one structured JSON blob, keyed by name.
    pub fn attributes_blob(&self) -> Value {
        let mut map = Map::new();
        for attribute in &self.memory.attributes {
            map.insert(attribute.name.clone(), attribute.value.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentry_types::memory::BlackboardCategory;
    use serde_json::json;

    #[test]
    fn append_preserves_order() {
        let mut store = MemoryStore::new();
        store.append_blackboard(BlackboardEntry::new(BlackboardCategory::Plan, "first", 0));
        store.append_blackboard(BlackboardEntry::new(BlackboardCategory::Insight, "second", 1));

        let board = store.blackboard();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].content, "first");
        assert_eq!(board[1].content, "second");
    }

    #[test]
    fn set_scratchpad_replaces_fully() {
        let mut store = MemoryStore::new();
        store.set_scratchpad("draft one");
        store.set_scratchpad("draft two");
        assert_eq!(store.scratchpad(), "draft two");
    }

    #[test]
    fn set_attribute_overwrites_by_name() {
        let mut store = MemoryStore::new();
        store.set_attribute("results", "web_search", json!([1, 2]), 1);
        store.set_attribute("results", "scrape", json!([3]), 2);

        assert_eq!(store.attribute_names(), vec!["results"]);
        let attribute = store.get_attribute("results").unwrap();
        assert_eq!(attribute.tool, "scrape");
        assert_eq!(attribute.value, json!([3]));
        assert_eq!(attribute.iteration, 2);
    }

    #[test]
    fn attribute_size_is_serialized_length() {
        let mut store = MemoryStore::new();
        store.set_attribute("n", "calc", json!(1234), 0);
        assert_eq!(store.get_attribute("n").unwrap().size, 4);
    }

    #[test]
    fn render_blackboard_heads_each_block() {
        let mut store = MemoryStore::new();
        store.append_blackboard(BlackboardEntry::new(
            BlackboardCategory::Observation,
            "saw a thing",
            2,
        ));

        let rendered = store.render_blackboard(None);
        assert!(rendered.starts_with("[iteration 2 | observation]"));
        assert!(rendered.contains("saw a thing"));
    }

    #[test]
    fn render_blackboard_windows_recent_entries() {
        let mut store = MemoryStore::new();
        for i in 0..10 {
            store.append_blackboard(BlackboardEntry::new(
                BlackboardCategory::Observation,
                format!("entry {i}"),
                i,
            ));
        }

        let rendered = store.render_blackboard(Some(3));
        assert!(!rendered.contains("entry 6"));
        assert!(rendered.contains("entry 7"));
        assert!(rendered.contains("entry 9"));
    }

    #[test]
    fn attributes_blob_keys_by_name() {
        let mut store = MemoryStore::new();
        store.set_attribute("a", "t", json!("x"), 0);
        store.set_attribute("b", "t", json!(2), 0);

        let blob = store.attributes_blob();
        assert_eq!(blob["a"], "x");
        assert_eq!(blob["b"], 2);
    }
}
