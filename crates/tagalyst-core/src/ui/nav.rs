//! Navigation controls: first / previous / next / last focus match.

use crate::dom::{Document, DomError, NodeId};

use super::{create_affordance, ensure_part, find_affordance, set_hidden};

pub const NAV: &str = "nav";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    First,
    Prev,
    Next,
    Last,
    ToggleStar,
}

impl NavAction {
    const BUTTONS: [NavAction; 4] = [NavAction::First, NavAction::Prev, NavAction::Next, NavAction::Last];

    pub fn as_str(&self) -> &'static str {
        match self {
            NavAction::First => "first",
            NavAction::Prev => "prev",
            NavAction::Next => "next",
            NavAction::Last => "last",
            NavAction::ToggleStar => "toggle-star",
        }
    }

    /// Action bound to a clicked control
    pub fn from_part(part: &str) -> Option<Self> {
        match part {
            "first" => Some(NavAction::First),
            "prev" => Some(NavAction::Prev),
            "next" => Some(NavAction::Next),
            "last" => Some(NavAction::Last),
            "toggle-star" => Some(NavAction::ToggleStar),
            _ => None,
        }
    }

    fn glyph(&self) -> &'static str {
        match self {
            NavAction::First => "⤒",
            NavAction::Prev => "↑",
            NavAction::Next => "↓",
            NavAction::Last => "⤓",
            NavAction::ToggleStar => "★",
        }
    }
}

pub fn find_nav(doc: &Document) -> Option<NodeId> {
    find_affordance(doc, doc.body(), NAV)
}

/// Mount or refresh the controls with the cursor position ("2/5").
pub fn render_nav(doc: &mut Document, position: Option<usize>, total: usize) -> Result<NodeId, DomError> {
    let nav = match find_nav(doc) {
        Some(nav) => nav,
        None => {
            let nav = create_affordance(doc, "div", NAV)?;
            for action in NavAction::BUTTONS {
                let button = ensure_part(doc, nav, "button", action.as_str())?;
                doc.set_text_content(button, action.glyph())?;
            }
            ensure_part(doc, nav, "span", "position")?;
            let body = doc.body();
            doc.append_child(body, nav)?;
            nav
        }
    };
    let label = ensure_part(doc, nav, "span", "position")?;
    let text = match position {
        Some(index) if total > 0 => format!("{}/{}", index + 1, total),
        _ => format!("–/{}", total),
    };
    doc.set_text_content(label, &text)?;
    set_hidden(doc, nav, false)?;
    Ok(nav)
}

pub fn remove_nav(doc: &mut Document) -> Result<(), DomError> {
    match find_nav(doc) {
        Some(nav) => doc.remove(nav),
        None => Ok(()),
    }
}
