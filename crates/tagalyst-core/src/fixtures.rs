//! Chat-shaped host documents for tests and offline tooling.
//!
//! A fixture mirrors the ChatGPT layout: a `main` transcript root holding
//! one `div[data-message-author-role]` per turn, each with a `.markdown`
//! body, plus an optional `nav` sidebar of `/c/{id}` links.

use serde::{Deserialize, Serialize};

use crate::constants::{ROLE_ASSISTANT, ROLE_USER};
use crate::dom::{Document, DomError, HostPage, Layout, NodeId};

pub const ROLE_ATTR: &str = "data-message-author-role";
pub const ID_ATTR: &str = "data-message-id";

/// Vertical distance between consecutive turns
const TURN_SPACING: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Turn {
    pub fn user(text: &str) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            text: text.to_string(),
            id: None,
        }
    }

    pub fn assistant(text: &str) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            text: text.to_string(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidebarLink {
    pub href: String,
    pub title: String,
}

/// A page description loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageFixture {
    pub location: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub sidebar: Vec<SidebarLink>,
}

impl PageFixture {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn build(&self) -> Result<HostPage, DomError> {
        let mut doc = Document::new();
        if !self.sidebar.is_empty() {
            append_sidebar(&mut doc, &self.sidebar)?;
        }
        let main = doc.create_element("main");
        doc.append_child(doc.body(), main)?;
        for turn in &self.turns {
            append_turn(&mut doc, main, turn)?;
        }
        Ok(HostPage::with_document(&self.location, doc))
    }
}

fn append_sidebar(doc: &mut Document, links: &[SidebarLink]) -> Result<NodeId, DomError> {
    let nav = doc.create_element("nav");
    doc.append_child(doc.body(), nav)?;
    for link in links {
        let a = doc.create_element("a");
        doc.set_attr(a, "href", &link.href)?;
        let title = doc.create_text(&link.title);
        doc.append_child(a, title)?;
        doc.append_child(nav, a)?;
    }
    Ok(nav)
}

/// Append one turn to `root`; paragraphs are separated by blank lines.
pub fn append_turn(doc: &mut Document, root: NodeId, turn: &Turn) -> Result<NodeId, DomError> {
    let index = doc.element_children(root).len();
    let message = doc.create_element("div");
    doc.set_attr(message, ROLE_ATTR, &turn.role)?;
    if let Some(id) = &turn.id {
        doc.set_attr(message, ID_ATTR, id)?;
    }
    doc.set_layout(
        message,
        Layout {
            top: Some(index as f64 * TURN_SPACING),
            height: Some(TURN_SPACING),
            scrollable: false,
        },
    )?;
    let body = doc.create_element("div");
    doc.set_attr(body, "class", "markdown prose")?;
    for paragraph in turn.text.split("\n\n") {
        let p = doc.create_element("p");
        let text = doc.create_text(paragraph);
        doc.append_child(p, text)?;
        doc.append_child(body, p)?;
    }
    doc.append_child(message, body)?;
    doc.append_child(root, message)?;
    Ok(message)
}

/// Document with a `main` root holding `turns`. Returns the root too.
pub fn chat_document(turns: &[Turn]) -> Result<(Document, NodeId), DomError> {
    let mut doc = Document::new();
    let main = doc.create_element("main");
    doc.append_child(doc.body(), main)?;
    for turn in turns {
        append_turn(&mut doc, main, turn)?;
    }
    Ok((doc, main))
}

/// `chat_document` wrapped in a page at `location`.
pub fn chat_page(location: &str, turns: &[Turn]) -> Result<(HostPage, NodeId), DomError> {
    let (doc, main) = chat_document(turns)?;
    Ok((HostPage::with_document(location, doc), main))
}

/// `n` alternating user/assistant turns with distinct text
pub fn alternating_turns(n: usize) -> Vec<Turn> {
    (0..n)
        .map(|i| {
            if i % 2 == 0 {
                Turn::user(&format!("question number {}", i / 2))
            } else {
                Turn::assistant(&format!("answer number {}", i / 2))
            }
        })
        .collect()
}
