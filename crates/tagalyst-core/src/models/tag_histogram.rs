use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Tag -> occurrence count accumulated over one render pass
#[derive(Debug, Default)]
pub struct TagHistogram {
    counts: HashMap<String, usize>,
}

impl TagHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: AsRef<str>>(&mut self, tags: &[S]) {
        for tag in tags {
            *self.counts.entry(tag.as_ref().to_string()).or_insert(0) += 1;
        }
    }

    /// Sorted by count (descending), then tag name (ascending)
    pub fn sorted(&self) -> Vec<TagCount> {
        let mut tags: Vec<TagCount> = self
            .counts
            .iter()
            .map(|(tag, &count)| TagCount {
                tag: tag.clone(),
                count,
            })
            .collect();
        tags.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_by_count_then_name() {
        let mut histogram = TagHistogram::new();
        histogram.add(&["x", "y"]);
        histogram.add(&["x", "y"]);
        histogram.add(&["y"]);
        histogram.add(&["b", "a"]);
        let sorted = histogram.sorted();
        let pairs: Vec<(&str, usize)> = sorted.iter().map(|t| (t.tag.as_str(), t.count)).collect();
        assert_eq!(pairs, vec![("y", 3), ("x", 2), ("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_shared_tag_ranks_first() {
        let mut histogram = TagHistogram::new();
        histogram.add(&["x", "y"]);
        histogram.add(&["y"]);
        assert_eq!(
            histogram.sorted(),
            vec![
                TagCount { tag: "y".to_string(), count: 2 },
                TagCount { tag: "x".to_string(), count: 1 },
            ]
        );
    }
}
