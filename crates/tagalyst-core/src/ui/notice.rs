//! Persistent notice. Stays until teardown; there is no auto-dismiss.

use crate::dom::{Document, DomError, NodeId};

use super::{create_affordance, find_affordance};

pub const NOTICE: &str = "notice";

pub fn show_notice(doc: &mut Document, message: &str) -> Result<NodeId, DomError> {
    let notice = match find_affordance(doc, doc.body(), NOTICE) {
        Some(notice) => notice,
        None => {
            let notice = create_affordance(doc, "div", NOTICE)?;
            doc.set_attr(notice, "role", "alert")?;
            let body = doc.body();
            doc.append_child(body, notice)?;
            notice
        }
    };
    doc.set_text_content(notice, message)?;
    Ok(notice)
}

pub fn notice_text(doc: &Document) -> Option<String> {
    find_affordance(doc, doc.body(), NOTICE).map(|n| doc.text_content(n).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_notice_replaces_text() {
        let mut doc = Document::new();
        let first = show_notice(&mut doc, "one").unwrap();
        let second = show_notice(&mut doc, "two").unwrap();
        assert_eq!(first, second);
        assert_eq!(notice_text(&doc).as_deref(), Some("two"));
    }
}
