use crate::dom::{Document, NodeId};
use crate::registry::MessageMetaRegistry;
use crate::ui::{panel, toolbar};

use super::FocusService;

/// Pushes focus state into the injected buttons and labels.
///
/// Stateless: every refresh re-reads the registry of the current pass.
pub struct FocusController;

impl FocusController {
    /// Update every message's focus button. Returns the number of focused
    /// messages.
    pub fn refresh_buttons(
        doc: &mut Document,
        registry: &mut MessageMetaRegistry,
        focus: &FocusService,
    ) -> usize {
        let mut states: Vec<(NodeId, bool)> = Vec::new();
        registry.for_each(doc, |el, meta| states.push((el, focus.is_message_focused(meta))));

        let mode = focus.mode();
        let mut focused = 0;
        for (el, is_focused) in states {
            if is_focused {
                focused += 1;
            }
            let Some(bar) = toolbar::toolbar_of(doc, el) else {
                continue;
            };
            if let Err(e) = toolbar::update_focus_button(doc, bar, mode, is_focused) {
                tracing::warn!("Focus button refresh failed for {:?}: {}", el, e);
            }
        }
        focused
    }

    pub fn refresh_mode_label(doc: &mut Document, focus: &FocusService) {
        if let Err(e) = panel::update_mode_label(doc, focus.mode()) {
            tracing::warn!("Mode label refresh failed: {}", e);
        }
    }

    pub fn refresh(doc: &mut Document, registry: &mut MessageMetaRegistry, focus: &FocusService) -> usize {
        let focused = Self::refresh_buttons(doc, registry, focus);
        Self::refresh_mode_label(doc, focus);
        focused
    }
}
