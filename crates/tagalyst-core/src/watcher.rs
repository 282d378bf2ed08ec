//! DOM and URL watcher.
//!
//! Observes the transcript root for structural changes and polls the
//! location for SPA navigation and the page for a remounted root. Mutations caused purely by our own injected
//! nodes are filtered out so rendering never re-triggers itself.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::adapters::ThreadAdapter;
use crate::dom::{Document, HostPage, MutationRecord, MutationStream, NodeId};

pub type MutationHook = Rc<dyn Fn(&[MutationRecord])>;
pub type NavHook = Rc<dyn Fn(&str, &str)>;
pub type RootChangeHook = Rc<dyn Fn(Option<NodeId>, Option<NodeId>)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Qualifying mutations were delivered to the mutation hook
    Mutations(usize),
    Navigated { from: String, to: String },
    /// The host replaced the transcript root without navigating
    RootChanged { from: NodeId, to: NodeId },
}

/// True when a record reflects a host change rather than our own UI.
///
/// Records targeting an injected subtree are dropped, as are records whose
/// added and removed nodes are all injected.
pub fn is_host_mutation(doc: &Document, record: &MutationRecord) -> bool {
    if doc.is_extension_owned(record.target) {
        return false;
    }
    let mut nodes = record.added().iter().chain(record.removed()).peekable();
    if nodes.peek().is_none() {
        return true;
    }
    !nodes.all(|n| doc.is_extension_owned(*n))
}

#[derive(Default)]
struct Hooks {
    on_mutations: Option<MutationHook>,
    on_nav: Option<NavHook>,
    on_root_change: Option<RootChangeHook>,
}

pub struct DomWatcher {
    page: Rc<HostPage>,
    hooks: RefCell<Hooks>,
    adapter: RefCell<Option<Rc<dyn ThreadAdapter>>>,
    root: Cell<Option<NodeId>>,
    stream: RefCell<Option<MutationStream>>,
    /// Bumped whenever the stream is replaced, so a parked stream from an
    /// older watch is not restored
    generation: Cell<u64>,
    backlog: RefCell<Vec<MutationRecord>>,
    last_location: RefCell<String>,
    url_poll_interval: Duration,
}

/// Holds the stream outside its cell while `next_event` awaits, and puts it
/// back on drop so a cancelled wait loses nothing.
struct ParkedStream<'a> {
    watcher: &'a DomWatcher,
    generation: u64,
    stream: Option<MutationStream>,
}

impl Drop for ParkedStream<'_> {
    fn drop(&mut self) {
        if self.watcher.generation.get() == self.generation {
            if let Some(stream) = self.stream.take() {
                *self.watcher.stream.borrow_mut() = Some(stream);
            }
        }
    }
}

impl DomWatcher {
    pub fn new(page: Rc<HostPage>, url_poll_interval: Duration) -> Self {
        let location = page.location();
        Self {
            page,
            hooks: RefCell::new(Hooks::default()),
            adapter: RefCell::new(None),
            root: Cell::new(None),
            stream: RefCell::new(None),
            generation: Cell::new(0),
            backlog: RefCell::new(Vec::new()),
            last_location: RefCell::new(location),
            url_poll_interval,
        }
    }

    pub fn on_mutations(&self, hook: MutationHook) {
        self.hooks.borrow_mut().on_mutations = Some(hook);
    }

    pub fn on_nav(&self, hook: NavHook) {
        self.hooks.borrow_mut().on_nav = Some(hook);
    }

    pub fn on_root_change(&self, hook: RootChangeHook) {
        self.hooks.borrow_mut().on_root_change = Some(hook);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root.get()
    }

    /// Observe `root` (childList + subtree) through `adapter`, replacing any
    /// earlier observation. `None` just stops watching.
    pub fn watch_container(&self, adapter: &Rc<dyn ThreadAdapter>, root: Option<NodeId>) {
        self.stop_observing();
        let previous = self.root.replace(root);
        if previous != root {
            let hook = self.hooks.borrow().on_root_change.clone();
            if let Some(hook) = hook {
                hook(previous, root);
            }
        }
        let Some(root) = root else {
            return;
        };
        let stream = adapter.observe(&mut self.page.document_mut(), root);
        *self.stream.borrow_mut() = Some(stream);
        *self.adapter.borrow_mut() = Some(Rc::clone(adapter));
        tracing::debug!("Watching transcript root {:?}", root);
    }

    fn stop_observing(&self) {
        self.generation.set(self.generation.get() + 1);
        self.stream.borrow_mut().take();
        self.backlog.borrow_mut().clear();
        let adapter = self.adapter.borrow_mut().take();
        if let Some(adapter) = adapter {
            adapter.disconnect(&mut self.page.document_mut());
        }
    }

    /// Stop observing and forget the root. Safe to call repeatedly.
    pub fn disconnect(&self) {
        self.stop_observing();
        self.root.set(None);
    }

    /// Deliver pending host mutations to the hook as one batch.
    /// Returns the number of qualifying records.
    pub fn pump_mutations(&self) -> usize {
        let mut records = std::mem::take(&mut *self.backlog.borrow_mut());
        if let Some(stream) = self.stream.borrow_mut().as_mut() {
            while let Ok(record) = stream.try_recv() {
                records.push(record);
            }
        }
        if records.is_empty() {
            return 0;
        }
        let qualifying: Vec<MutationRecord> = {
            let doc = self.page.document();
            records
                .into_iter()
                .filter(|r| is_host_mutation(&doc, r))
                .collect()
        };
        if qualifying.is_empty() {
            return 0;
        }
        let hook = self.hooks.borrow().on_mutations.clone();
        if let Some(hook) = hook {
            hook(&qualifying);
        }
        qualifying.len()
    }

    /// Record the current location as seen without firing the hook.
    pub fn watch_url(&self) {
        *self.last_location.borrow_mut() = self.page.location();
    }

    /// Compare the location with the last one seen; fire `on_nav` on change.
    pub fn poll_url(&self) -> Option<(String, String)> {
        let current = self.page.location();
        let previous = {
            let mut last = self.last_location.borrow_mut();
            if *last == current {
                return None;
            }
            std::mem::replace(&mut *last, current.clone())
        };
        tracing::info!("Navigation detected: {} -> {}", previous, current);
        let hook = self.hooks.borrow().on_nav.clone();
        if let Some(hook) = hook {
            hook(&previous, &current);
        }
        Some((previous, current))
    }

    /// Ask the adapter for the transcript root again and move the
    /// observation when the host has mounted a different one.
    /// Returns `(old, new)` on a switch; the root-change hook has already run.
    pub fn check_root(&self) -> Option<(NodeId, NodeId)> {
        let current = self.root.get()?;
        let adapter = self.adapter.borrow().clone()?;
        let found = adapter.transcript_root(&self.page.document())?;
        if found == current {
            return None;
        }
        tracing::info!("Transcript root replaced: {:?} -> {:?}", current, found);
        self.watch_container(&adapter, Some(found));
        Some((current, found))
    }

    /// Wait for the next qualifying mutation batch, navigation or root swap.
    pub async fn next_event(&self) -> WatchEvent {
        loop {
            if let Some((from, to)) = self.poll_url() {
                return WatchEvent::Navigated { from, to };
            }
            if let Some((from, to)) = self.check_root() {
                return WatchEvent::RootChanged { from, to };
            }
            let count = self.pump_mutations();
            if count > 0 {
                return WatchEvent::Mutations(count);
            }

            let stream = self.stream.borrow_mut().take();
            let Some(stream) = stream else {
                tokio::time::sleep(self.url_poll_interval).await;
                continue;
            };
            let mut parked = ParkedStream {
                watcher: self,
                generation: self.generation.get(),
                stream: Some(stream),
            };
            let received = match parked.stream.as_mut() {
                Some(stream) => tokio::time::timeout(self.url_poll_interval, stream.recv()).await,
                None => continue,
            };
            match received {
                Ok(Some(record)) => self.backlog.borrow_mut().push(record),
                Ok(None) => {
                    // Observer was disconnected underneath us
                    parked.stream = None;
                    tokio::time::sleep(self.url_poll_interval).await;
                }
                Err(_) => {}
            }
            drop(parked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{HostProfile, MarkedThreadAdapter};
    use crate::constants::EXT_ATTR;
    use crate::dom::MutationKind;
    use crate::fixtures::{append_turn, chat_page, Turn};

    fn setup() -> (Rc<HostPage>, NodeId, Rc<dyn ThreadAdapter>) {
        let (page, main) = chat_page("https://chatgpt.com/c/t", &[Turn::user("hello")]).unwrap();
        let adapter: Rc<dyn ThreadAdapter> = Rc::new(MarkedThreadAdapter::new(HostProfile::chatgpt()));
        (Rc::new(page), main, adapter)
    }

    fn counting_hook(count: &Rc<Cell<usize>>) -> MutationHook {
        let count = count.clone();
        Rc::new(move |records: &[MutationRecord]| count.set(count.get() + records.len()))
    }

    #[test]
    fn test_is_host_mutation_filters_injected_nodes() {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        let ours = doc.create_element("div");
        let theirs = doc.create_element("p");
        doc.set_attr(ours, EXT_ATTR, "toolbar").unwrap();
        let record = |added: Vec<NodeId>| MutationRecord {
            target: host,
            kind: MutationKind::ChildList {
                added,
                removed: Vec::new(),
            },
        };
        assert!(!is_host_mutation(&doc, &record(vec![ours])));
        assert!(is_host_mutation(&doc, &record(vec![ours, theirs])));
        let inside = MutationRecord {
            target: ours,
            kind: MutationKind::CharacterData,
        };
        assert!(!is_host_mutation(&doc, &inside));
    }

    #[test]
    fn test_pump_batches_host_mutations_only() {
        let (page, main, adapter) = setup();
        let watcher = DomWatcher::new(page.clone(), Duration::from_millis(1));
        let count = Rc::new(Cell::new(0));
        let batches = Rc::new(Cell::new(0));
        {
            let count = count.clone();
            let batches = batches.clone();
            watcher.on_mutations(Rc::new(move |records: &[MutationRecord]| {
                batches.set(batches.get() + 1);
                count.set(count.get() + records.len());
            }));
        }
        watcher.watch_container(&adapter, Some(main));

        {
            let mut doc = page.document_mut();
            let message = doc.element_children(main)[0];
            let toolbar = crate::ui::create_affordance(&mut doc, "div", "toolbar").unwrap();
            doc.prepend_child(message, toolbar).unwrap();
        }
        assert_eq!(watcher.pump_mutations(), 0);
        assert_eq!(batches.get(), 0);

        {
            let mut doc = page.document_mut();
            append_turn(&mut doc, main, &Turn::assistant("hi there")).unwrap();
            append_turn(&mut doc, main, &Turn::user("again")).unwrap();
        }
        assert_eq!(watcher.pump_mutations(), 2);
        assert_eq!(batches.get(), 1);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_watch_container_replaces_observer_and_reports_root_change() {
        let (page, main, adapter) = setup();
        let watcher = DomWatcher::new(page.clone(), Duration::from_millis(1));
        let changes = Rc::new(RefCell::new(Vec::new()));
        {
            let changes = changes.clone();
            watcher.on_root_change(Rc::new(move |prev, next| changes.borrow_mut().push((prev, next))));
        }
        watcher.watch_container(&adapter, Some(main));
        watcher.watch_container(&adapter, Some(main));
        assert_eq!(page.document().observer_count(), 1);
        assert_eq!(*changes.borrow(), vec![(None, Some(main))]);

        watcher.disconnect();
        watcher.disconnect();
        assert_eq!(page.document().observer_count(), 0);
        assert_eq!(watcher.root(), None);
    }

    #[test]
    fn test_poll_url_fires_on_change() {
        let (page, _, _) = setup();
        let watcher = DomWatcher::new(page.clone(), Duration::from_millis(1));
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = seen.clone();
            watcher.on_nav(Rc::new(move |from, to| seen.borrow_mut().push((from.to_string(), to.to_string()))));
        }
        assert_eq!(watcher.poll_url(), None);
        page.set_location("https://chatgpt.com/c/other");
        assert!(watcher.poll_url().is_some());
        assert_eq!(watcher.poll_url(), None);
        assert_eq!(seen.borrow().len(), 1);

        page.set_location("https://chatgpt.com/c/third");
        watcher.watch_url();
        assert_eq!(watcher.poll_url(), None);
    }

    #[tokio::test]
    async fn test_check_root_follows_remounted_root() {
        let (page, main, adapter) = setup();
        let watcher = DomWatcher::new(page.clone(), Duration::from_millis(1));
        let changes = Rc::new(RefCell::new(Vec::new()));
        {
            let changes = changes.clone();
            watcher.on_root_change(Rc::new(move |prev, next| changes.borrow_mut().push((prev, next))));
        }
        watcher.watch_container(&adapter, Some(main));
        assert_eq!(watcher.check_root(), None);

        let fresh = {
            let mut doc = page.document_mut();
            doc.remove(main).unwrap();
            let fresh = doc.create_element("main");
            let body = doc.body();
            doc.append_child(body, fresh).unwrap();
            append_turn(&mut doc, fresh, &Turn::user("hello again")).unwrap();
            fresh
        };
        let event = watcher.next_event().await;
        assert_eq!(event, WatchEvent::RootChanged { from: main, to: fresh });
        assert_eq!(watcher.root(), Some(fresh));
        assert_eq!(page.document().observer_count(), 1);
        assert_eq!(changes.borrow().last(), Some(&(Some(main), Some(fresh))));

        let count = Rc::new(Cell::new(0));
        watcher.on_mutations(counting_hook(&count));
        append_turn(&mut page.document_mut(), fresh, &Turn::assistant("reply")).unwrap();
        assert_eq!(watcher.pump_mutations(), 1);
        assert_eq!(count.get(), 1);
    }

    #[tokio::test]
    async fn test_next_event_reports_mutations_and_navigation() {
        let (page, main, adapter) = setup();
        let watcher = DomWatcher::new(page.clone(), Duration::from_millis(1));
        let count = Rc::new(Cell::new(0));
        watcher.on_mutations(counting_hook(&count));
        watcher.watch_container(&adapter, Some(main));

        let producer = async {
            tokio::task::yield_now().await;
            let mut doc = page.document_mut();
            append_turn(&mut doc, main, &Turn::assistant("late reply")).unwrap();
        };
        let (event, ()) = futures::join!(watcher.next_event(), producer);
        assert_eq!(event, WatchEvent::Mutations(1));
        assert_eq!(count.get(), 1);

        page.set_location("https://chatgpt.com/c/next");
        let event = watcher.next_event().await;
        assert!(matches!(event, WatchEvent::Navigated { .. }));
    }
}
