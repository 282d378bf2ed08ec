use serde::Serialize;
use serde_json::{Map, Value};

use crate::adapters::MessageAdapter;

/// Per-thread record, independent of per-message metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThreadMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Message count at the last render
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    /// Total characters at the last render
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chars: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ThreadMetadata {
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let mut extra = obj.clone();
        let text = |v: Value| v.as_str().map(str::to_string);
        Self {
            name: extra.remove("name").and_then(text).filter(|n| !n.trim().is_empty()),
            tags: extra.remove("tags").and_then(|v| {
                v.as_array().map(|items| {
                    items
                        .iter()
                        .filter_map(|t| t.as_str().map(str::to_string))
                        .collect()
                })
            }),
            note: extra.remove("note").and_then(text),
            length: extra.remove("length").and_then(|v| v.as_u64()),
            chars: extra.remove("chars").and_then(|v| v.as_u64()),
            size: extra.remove("size").and_then(|v| v.as_u64()),
            starred: extra.remove("starred").and_then(|v| v.as_bool()),
            extra,
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Object(Map::new()))
    }

    pub fn is_starred(&self) -> bool {
        self.starred.unwrap_or(false)
    }

    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or(&[])
    }

    /// Fold freshly computed stats into the record.
    /// Returns true when anything changed.
    pub fn apply_stats(&mut self, stats: &ThreadStats) -> bool {
        let length = Some(stats.messages as u64);
        let chars = Some(stats.chars as u64);
        let changed = self.length != length || self.chars != chars;
        self.length = length;
        self.chars = chars;
        changed
    }
}

/// Aggregate numbers for one thread, always derived from live adapters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThreadStats {
    pub messages: usize,
    pub prompts: usize,
    pub chars: usize,
}

impl ThreadStats {
    pub fn from_messages(messages: &[std::rc::Rc<MessageAdapter>], prompts: usize) -> Self {
        Self {
            messages: messages.len(),
            prompts,
            chars: messages.iter().map(|m| m.char_count()).sum(),
        }
    }
}
