//! Keyboard navigation over focus matches.
//!
//! Bindings are declared once in [`BINDINGS`]; [`resolve`] maps a key event
//! to a [`NavAction`] and [`KeyboardController`] performs it against the
//! live registry.

use std::cell::Cell;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::render::ThreadRenderService;
use crate::ui::nav::NavAction;

/// A key event as seen by the page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInput {
    /// DOM `key` value ("ArrowDown", "j", ...)
    pub key: String,
    pub alt: bool,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    /// Focus is in an input, textarea or contenteditable
    pub in_editable: bool,
}

impl KeyInput {
    pub fn alt(key: &str) -> Self {
        Self {
            key: key.to_string(),
            alt: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KeyBinding {
    pub key: &'static str,
    pub action: NavAction,
    pub description: &'static str,
}

/// All bindings require Alt alone
pub const BINDINGS: &[KeyBinding] = &[
    KeyBinding { key: "ArrowDown", action: NavAction::Next, description: "Next focused message" },
    KeyBinding { key: "j", action: NavAction::Next, description: "Next focused message" },
    KeyBinding { key: "ArrowUp", action: NavAction::Prev, description: "Previous focused message" },
    KeyBinding { key: "k", action: NavAction::Prev, description: "Previous focused message" },
    KeyBinding { key: "Home", action: NavAction::First, description: "First focused message" },
    KeyBinding { key: "End", action: NavAction::Last, description: "Last focused message" },
    KeyBinding { key: "s", action: NavAction::ToggleStar, description: "Star or unstar the current message" },
];

pub fn resolve(input: &KeyInput) -> Option<NavAction> {
    if input.in_editable || !input.alt || input.ctrl || input.meta || input.shift {
        return None;
    }
    BINDINGS
        .iter()
        .find(|b| b.key.eq_ignore_ascii_case(&input.key))
        .map(|b| b.action)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Ignored,
    /// Cursor moved to `index` and the message was scrolled into view
    Moved { index: usize, element: NodeId },
    Starred { element: NodeId, starred: bool },
    NoMatches,
}

pub struct KeyboardController {
    service: Rc<ThreadRenderService>,
    enabled: Cell<bool>,
    last_target: Cell<Option<NodeId>>,
}

impl KeyboardController {
    pub fn new(service: Rc<ThreadRenderService>) -> Self {
        Self {
            service,
            enabled: Cell::new(true),
            last_target: Cell::new(None),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.set(enabled);
    }

    /// Message the cursor last landed on
    pub fn last_target(&self) -> Option<NodeId> {
        self.last_target.get()
    }

    pub fn reset(&self) {
        self.last_target.set(None);
        self.service.focus().borrow_mut().set_nav_index(None);
    }

    pub async fn handle(&self, input: &KeyInput) -> KeyOutcome {
        if !self.enabled.get() {
            return KeyOutcome::Ignored;
        }
        match resolve(input) {
            Some(action) => self.perform(action).await,
            None => KeyOutcome::Ignored,
        }
    }

    pub async fn perform(&self, action: NavAction) -> KeyOutcome {
        if action == NavAction::ToggleStar {
            return self.toggle_current_star().await;
        }
        self.navigate(action)
    }

    fn navigate(&self, action: NavAction) -> KeyOutcome {
        let page = self.service.page();
        let matches = {
            let doc = page.document();
            let focus = self.service.focus().borrow();
            focus.get_matches(&mut self.service.registry().borrow_mut(), &doc)
        };
        let total = matches.len();
        let delta = match action {
            NavAction::Next => 1,
            NavAction::Prev => -1,
            NavAction::First => -(total as isize),
            NavAction::Last => total as isize,
            NavAction::ToggleStar => 0,
        };
        let Some(index) = self.service.focus().borrow_mut().adjust_nav(delta, total) else {
            return KeyOutcome::NoMatches;
        };
        let element = matches[index].element;
        if let Err(e) = page.document_mut().scroll_into_view(element) {
            tracing::warn!("Failed to scroll to focused message: {}", e);
        }
        self.last_target.set(Some(element));
        self.service.request_render();
        KeyOutcome::Moved { index, element }
    }

    async fn toggle_current_star(&self) -> KeyOutcome {
        let Some(element) = self.current_element() else {
            return KeyOutcome::NoMatches;
        };
        match self.service.toggle_star(element).await {
            Some(starred) => KeyOutcome::Starred { element, starred },
            None => KeyOutcome::Ignored,
        }
    }

    /// Match under the cursor, falling back to the last message moved to
    fn current_element(&self) -> Option<NodeId> {
        let page = self.service.page();
        let doc = page.document();
        let focus = self.service.focus().borrow();
        let matches = focus.get_matches(&mut self.service.registry().borrow_mut(), &doc);
        focus
            .nav_index()
            .and_then(|i| matches.get(i))
            .map(|m| m.element)
            .or_else(|| self.last_target.get().filter(|el| doc.is_connected(*el)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{HostProfile, MarkedThreadAdapter};
    use crate::config::ConfigService;
    use crate::dom::HostPage;
    use crate::fixtures::{chat_page, Turn};
    use crate::render::RenderContext;
    use crate::scheduler::RenderScheduler;
    use crate::storage::MemoryStorage;
    use serde_json::json;

    async fn setup(starred: &[&str]) -> (Rc<HostPage>, KeyboardController) {
        let turns: Vec<Turn> = ["a", "b", "c", "d"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let turn = if i % 2 == 0 { Turn::user(id) } else { Turn::assistant(id) };
                turn.with_id(id)
            })
            .collect();
        let (page, main) = chat_page("https://chatgpt.com/c/t", &turns).unwrap();
        let page = Rc::new(page);
        let storage = Rc::new(MemoryStorage::new());
        for id in starred {
            storage.insert(&format!("t:{}", id), json!({"starred": true}));
        }
        let config = Rc::new(ConfigService::new(storage.clone()));
        let service = ThreadRenderService::new(
            page.clone(),
            storage,
            config,
            Rc::new(RenderScheduler::new(None)),
        );
        service.attach(RenderContext {
            container: main,
            thread_id: Some("t".to_string()),
            thread_key: "t".to_string(),
            adapter: Rc::new(MarkedThreadAdapter::new(HostProfile::chatgpt())),
        });
        service.render_now().await;
        (page, KeyboardController::new(service))
    }

    #[test]
    fn test_resolve_requires_alt_outside_editables() {
        assert_eq!(resolve(&KeyInput::alt("ArrowDown")), Some(NavAction::Next));
        assert_eq!(resolve(&KeyInput::alt("K")), Some(NavAction::Prev));
        let plain = KeyInput {
            key: "ArrowDown".to_string(),
            ..KeyInput::default()
        };
        assert_eq!(resolve(&plain), None);
        let editing = KeyInput {
            in_editable: true,
            ..KeyInput::alt("j")
        };
        assert_eq!(resolve(&editing), None);
    }

    #[tokio::test]
    async fn test_navigation_clamps_and_scrolls() {
        let (page, keyboard) = setup(&["a", "c", "d"]).await;
        let mut seen = Vec::new();
        for _ in 0..4 {
            match keyboard.handle(&KeyInput::alt("j")).await {
                KeyOutcome::Moved { index, .. } => seen.push(index),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 2]);
        assert_eq!(page.document().scrolled_to(), keyboard.last_target());

        let KeyOutcome::Moved { index, .. } = keyboard.handle(&KeyInput::alt("Home")).await else {
            panic!("expected a move");
        };
        assert_eq!(index, 0);
        let KeyOutcome::Moved { index, .. } = keyboard.handle(&KeyInput::alt("End")).await else {
            panic!("expected a move");
        };
        assert_eq!(index, 2);
    }

    #[tokio::test]
    async fn test_no_matches() {
        let (_page, keyboard) = setup(&[]).await;
        assert_eq!(keyboard.handle(&KeyInput::alt("j")).await, KeyOutcome::NoMatches);
        assert_eq!(keyboard.handle(&KeyInput::alt("s")).await, KeyOutcome::NoMatches);
    }

    #[tokio::test]
    async fn test_toggle_star_on_current_match() {
        let (_page, keyboard) = setup(&["b"]).await;
        let KeyOutcome::Moved { element, .. } = keyboard.handle(&KeyInput::alt("j")).await else {
            panic!("expected a move");
        };
        assert_eq!(
            keyboard.handle(&KeyInput::alt("s")).await,
            KeyOutcome::Starred { element, starred: false }
        );
        keyboard.set_enabled(false);
        assert_eq!(keyboard.handle(&KeyInput::alt("j")).await, KeyOutcome::Ignored);
    }
}
