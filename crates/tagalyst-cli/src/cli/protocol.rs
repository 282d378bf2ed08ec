use serde::{Deserialize, Serialize};

/// Commands the CLI can run against a fixture page and a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CliCommand {
    /// Query/response pairs of the page
    Pairs,
    /// One render pass: stats, tag histogram and focus matches
    Render,
    /// Focus matches after selecting tags and/or entering a search
    Matches {
        tags: Vec<String>,
        search: Option<String>,
    },
    /// Toggle the star of the message at `index`
    Star { index: usize },
    /// Replace the tags of the message at `index`
    Tag { index: usize, tags: Vec<String> },
    Note { index: usize, note: String },
    /// Rename the thread
    Name { name: String },
    /// Show settings, optionally setting one flag first
    Config { flag: Option<(String, bool)> },
}
