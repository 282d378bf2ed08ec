//! Page classification from the location URL.
//!
//! Recognized paths:
//! - `/c/{thread}` - a thread
//! - `/g/{project}/c/{thread}` - a thread inside a project
//! - `/g/{project}` and `/g/{project}/project` - a project overview

use serde::Serialize;
use url::Url;

use crate::identity::hash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Thread,
    ProjectThread,
    Project,
    Unknown,
}

impl PageKind {
    pub fn is_thread(&self) -> bool {
        matches!(self, PageKind::Thread | PageKind::ProjectThread)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub kind: PageKind,
    pub thread_id: Option<String>,
    pub project_id: Option<String>,
    /// Storage namespace for this page's message records
    pub thread_key: String,
}

impl PageInfo {
    pub fn from_location(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) => Self::from_url(&url),
            Err(_) => Self::classify(location),
        }
    }

    pub fn from_url(url: &Url) -> Self {
        Self::classify(url.path())
    }

    fn classify(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (kind, project_id, thread_id) = match segments.as_slice() {
            ["c", thread, ..] => (PageKind::Thread, None, Some(*thread)),
            ["g", project, "c", thread, ..] => (PageKind::ProjectThread, Some(*project), Some(*thread)),
            ["g", project] | ["g", project, "project"] => (PageKind::Project, Some(*project), None),
            _ => (PageKind::Unknown, None, None),
        };
        let thread_key = match thread_id {
            Some(id) => id.to_string(),
            None => hash(path),
        };
        Self {
            kind,
            thread_id: thread_id.map(str::to_string),
            project_id: project_id.map(str::to_string),
            thread_key,
        }
    }
}

/// Thread id a sidebar link points at, for absolute or root-relative hrefs.
/// Returns the id and whether the link is inside a project.
pub fn thread_link_target(href: &str) -> Option<(String, bool)> {
    let path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let info = PageInfo::classify(&path);
    let in_project = info.kind == PageKind::ProjectThread;
    info.thread_id.map(|id| (id, in_project))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_pages() {
        let info = PageInfo::from_location("https://chatgpt.com/c/abc-123");
        assert_eq!(info.kind, PageKind::Thread);
        assert_eq!(info.thread_id.as_deref(), Some("abc-123"));
        assert_eq!(info.thread_key, "abc-123");

        let info = PageInfo::from_location("https://chatgpt.com/g/g-p-xyz/c/def?model=x");
        assert_eq!(info.kind, PageKind::ProjectThread);
        assert_eq!(info.project_id.as_deref(), Some("g-p-xyz"));
        assert_eq!(info.thread_id.as_deref(), Some("def"));
        assert!(info.kind.is_thread());
    }

    #[test]
    fn test_project_and_unknown_pages() {
        let info = PageInfo::from_location("https://chatgpt.com/g/g-p-xyz/project");
        assert_eq!(info.kind, PageKind::Project);
        assert!(!info.kind.is_thread());
        assert_eq!(PageInfo::from_location("https://chatgpt.com/g/g-p-xyz").kind, PageKind::Project);

        let info = PageInfo::from_location("https://chatgpt.com/");
        assert_eq!(info.kind, PageKind::Unknown);
        assert_eq!(info.thread_id, None);
        assert_eq!(info.thread_key, hash("/"));
    }

    #[test]
    fn test_thread_link_target() {
        assert_eq!(thread_link_target("/c/abc"), Some(("abc".to_string(), false)));
        assert_eq!(thread_link_target("/g/p1/c/abc#x"), Some(("abc".to_string(), true)));
        assert_eq!(
            thread_link_target("https://chatgpt.com/c/zzz?x=1"),
            Some(("zzz".to_string(), false))
        );
        assert_eq!(thread_link_target("/library"), None);
    }
}
