use serde::Serialize;
use serde_json::{Map, Value};

/// Persisted per-message metadata.
///
/// Parsed leniently: a field with an unexpected type is treated as absent,
/// and unknown fields are carried through untouched so writes from newer
/// versions survive a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Owned by the annotation feature; opaque here
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageValue {
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let mut extra = obj.clone();
        let starred = extra.remove("starred").and_then(|v| v.as_bool());
        let tags = extra.remove("tags").and_then(|v| {
            v.as_array().map(|items| {
                items
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
        });
        let note = extra
            .remove("note")
            .and_then(|v| v.as_str().map(str::to_string));
        let highlights = extra.remove("highlights").filter(|v| !v.is_null());
        Self {
            starred,
            tags,
            note,
            highlights,
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

    /// Note text, if present and not blank
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref().filter(|n| !n.trim().is_empty())
    }

    pub fn has_highlights(&self) -> bool {
        match &self.highlights {
            Some(Value::Array(items)) => !items.is_empty(),
            Some(Value::Object(map)) => !map.is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    /// Replace the tag list, dropping blanks and case-insensitive duplicates
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            let tag = tag.as_ref().trim();
            if tag.is_empty() || out.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                continue;
            }
            out.push(tag.to_string());
        }
        self.tags = if out.is_empty() { None } else { Some(out) };
    }

    pub fn set_note(&mut self, note: &str) {
        let note = note.trim();
        self.note = if note.is_empty() {
            None
        } else {
            Some(note.to_string())
        };
    }

    /// Flip the star and return the new state
    pub fn toggle_star(&mut self) -> bool {
        let starred = !self.is_starred();
        self.starred = if starred { Some(true) } else { None };
        starred
    }
}
