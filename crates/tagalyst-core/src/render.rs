//! Thread render service: one idempotent reconciliation pass over the
//! transcript, guarded so at most one pass runs and at most one waits.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use serde::Serialize;

use crate::adapters::ThreadAdapter;
use crate::config::{Config, ConfigService};
use crate::dom::{Document, DomError, HostPage, NodeId};
use crate::focus::{FocusController, FocusMode, FocusService};
use crate::identity::{derive_message_key, message_storage_key, thread_storage_key};
use crate::models::{MessageValue, TagCount, TagHistogram, ThreadMetadata, ThreadStats};
use crate::registry::{MessageMeta, MessageMetaRegistry, MetaPatch};
use crate::scheduler::RenderScheduler;
use crate::storage::{read_one, write_one, StorageGateway, StorageRecord};
use crate::transcript::build_transcript;
use crate::ui::overview::{layout_entries, OverviewRuler};
use crate::ui::panel::{render_panel, PanelView};
use crate::ui::toolbar::{self, ToolbarView};
use crate::ui::{header, nav};

/// What a pass renders into: the transcript root and its storage namespace
#[derive(Clone)]
pub struct RenderContext {
    pub container: NodeId,
    /// Thread id from the URL; `None` for pages without one
    pub thread_id: Option<String>,
    /// Namespace for message records (`{thread_key}:{message_key}`)
    pub thread_key: String,
    pub adapter: Rc<dyn ThreadAdapter>,
}

impl RenderContext {
    fn thread_record_key(&self) -> String {
        thread_storage_key(self.thread_id.as_deref().unwrap_or(&self.thread_key))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderPhase {
    Idle,
    Running { queued: bool },
}

/// Outcome of one pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderSummary {
    pub stats: ThreadStats,
    /// Count descending, then tag name ascending
    pub tags: Vec<TagCount>,
    pub mode: FocusMode,
    /// Focus matches, top to bottom, as message keys
    pub matches: Vec<String>,
    /// Result counter shown while a search is active
    pub search_count: Option<usize>,
}

pub struct ThreadRenderService {
    page: Rc<HostPage>,
    storage: Rc<dyn StorageGateway>,
    config: Rc<ConfigService>,
    scheduler: Rc<RenderScheduler>,
    focus: Rc<RefCell<FocusService>>,
    registry: Rc<RefCell<MessageMetaRegistry>>,
    overview: Rc<RefCell<OverviewRuler>>,
    context: RefCell<Option<RenderContext>>,
    phase: Cell<RenderPhase>,
    passes: Cell<u64>,
    last_summary: RefCell<Option<RenderSummary>>,
}

impl ThreadRenderService {
    pub fn new(
        page: Rc<HostPage>,
        storage: Rc<dyn StorageGateway>,
        config: Rc<ConfigService>,
        scheduler: Rc<RenderScheduler>,
    ) -> Rc<Self> {
        let focus = FocusService::new(&config.current());
        Rc::new(Self {
            page,
            storage,
            config,
            scheduler,
            focus: Rc::new(RefCell::new(focus)),
            registry: Rc::new(RefCell::new(MessageMetaRegistry::new())),
            overview: Rc::new(RefCell::new(OverviewRuler::new())),
            context: RefCell::new(None),
            phase: Cell::new(RenderPhase::Idle),
            passes: Cell::new(0),
            last_summary: RefCell::new(None),
        })
    }

    pub fn page(&self) -> &Rc<HostPage> {
        &self.page
    }

    pub fn storage(&self) -> &Rc<dyn StorageGateway> {
        &self.storage
    }

    pub fn config(&self) -> &Rc<ConfigService> {
        &self.config
    }

    pub fn focus(&self) -> &Rc<RefCell<FocusService>> {
        &self.focus
    }

    pub fn registry(&self) -> &Rc<RefCell<MessageMetaRegistry>> {
        &self.registry
    }

    pub fn overview(&self) -> &Rc<RefCell<OverviewRuler>> {
        &self.overview
    }

    pub fn context(&self) -> Option<RenderContext> {
        self.context.borrow().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.context.borrow().is_some()
    }

    /// Number of passes that actually rendered
    pub fn passes(&self) -> u64 {
        self.passes.get()
    }

    pub fn last_summary(&self) -> Option<RenderSummary> {
        self.last_summary.borrow().clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Bind to a transcript and register as the scheduler's renderer.
    pub fn attach(self: &Rc<Self>, context: RenderContext) {
        tracing::debug!(
            "Attaching render service to {:?} ({})",
            context.container,
            context.thread_key
        );
        *self.context.borrow_mut() = Some(context);
        let weak = Rc::downgrade(self);
        self.scheduler.set_renderer(Rc::new(move || {
            let weak = weak.clone();
            async move {
                if let Some(service) = weak.upgrade() {
                    service.run_render().await;
                }
            }
            .boxed_local()
        }));
    }

    pub fn detach(&self) {
        self.context.borrow_mut().take();
        self.scheduler.reset();
    }

    /// Ask for a pass on the next frame
    pub fn request_render(&self) {
        self.scheduler.request(None);
    }

    /// Render immediately, bypassing the frame scheduler
    pub async fn render_now(&self) -> Option<RenderSummary> {
        self.run_render().await
    }

    /// Single-flight: a call while a pass is running marks it queued and
    /// returns at once; the running call then loops until nothing is queued.
    pub async fn run_render(&self) -> Option<RenderSummary> {
        if let RenderPhase::Running { .. } = self.phase.get() {
            self.phase.set(RenderPhase::Running { queued: true });
            return None;
        }
        let mut summary;
        loop {
            self.phase.set(RenderPhase::Running { queued: false });
            summary = self.render_once().await;
            if self.phase.get() != (RenderPhase::Running { queued: true }) {
                break;
            }
            tracing::debug!("Render queued during pass; running again");
        }
        self.phase.set(RenderPhase::Idle);
        summary
    }

    // =========================================================================
    // The pass
    // =========================================================================

    pub async fn render_once(&self) -> Option<RenderSummary> {
        let context = self.context()?;
        let config = self.config.current();
        self.passes.set(self.passes.get() + 1);

        let transcript = build_transcript(&self.page.document(), context.container, context.adapter.as_ref());
        let stats = ThreadStats::from_messages(&transcript.messages, transcript.prompt_count());

        let thread_meta = self.persist_stats(&context, &stats).await;
        self.refresh_header(&context, &config, &thread_meta, &stats);

        if transcript.is_empty() {
            tracing::debug!("No messages under {:?}; skipping message pass", context.container);
            self.registry.borrow_mut().clear();
            if let Err(e) = self.overview.borrow_mut().reset(&mut self.page.document_mut()) {
                tracing::warn!("Overview reset failed: {}", e);
            }
            let summary = RenderSummary {
                stats,
                mode: self.focus.borrow().mode(),
                ..RenderSummary::default()
            };
            *self.last_summary.borrow_mut() = Some(summary.clone());
            return Some(summary);
        }

        // One bulk read per pass; every message sees the same snapshot
        let keys: Vec<String> = transcript
            .messages
            .iter()
            .map(|m| message_storage_key(&context.thread_key, &m.key))
            .collect();
        let record = match self.storage.read(&keys).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Bulk metadata read failed, rendering without it: {}", e);
                StorageRecord::new()
            }
        };

        let mut doc = self.page.document_mut();
        let mut registry = self.registry.borrow_mut();
        let focus = self.focus.borrow();

        registry.clear();
        let mut histogram = TagHistogram::new();
        for (message, key) in transcript.messages.iter().zip(&keys) {
            let value = record
                .get(key)
                .map(MessageValue::from_json)
                .unwrap_or_default();
            histogram.add(value.tags());
            let meta = registry.update(
                message.element,
                MetaPatch {
                    key: Some(message.key.clone()),
                    value: Some(value),
                    pair_index: transcript.pair_index(message.element),
                    adapter: Some(Rc::clone(message)),
                },
            );
            if let Err(e) = render_message(&mut doc, &config, &focus, meta) {
                tracing::warn!("Skipping message {}: {}", message.key, e);
            }
        }
        let tags = histogram.sorted();

        FocusController::refresh(&mut doc, &mut registry, &focus);
        self.refresh_overview(&mut doc, &mut registry, &focus, &config);

        let matches = focus.get_matches(&mut registry, &doc);
        let search_count = (focus.mode() == FocusMode::Search).then_some(matches.len());
        let panel = PanelView {
            config: &config,
            tags: &tags,
            focus: &focus,
            search_count,
        };
        if let Err(e) = render_panel(&mut doc, &panel) {
            tracing::warn!("Panel refresh failed: {}", e);
        }
        let nav_result = if config.nav_toolbar_enabled {
            nav::render_nav(&mut doc, focus.nav_index(), matches.len()).map(|_| ())
        } else {
            nav::remove_nav(&mut doc)
        };
        if let Err(e) = nav_result {
            tracing::warn!("Navigation controls refresh failed: {}", e);
        }

        let summary = RenderSummary {
            stats,
            tags,
            mode: focus.mode(),
            matches: matches.iter().map(|m| m.key.clone()).collect(),
            search_count,
        };
        tracing::debug!(
            "Rendered {} messages, {} tags, {} matches",
            summary.stats.messages,
            summary.tags.len(),
            summary.matches.len()
        );
        *self.last_summary.borrow_mut() = Some(summary.clone());
        Some(summary)
    }

    /// Fold fresh stats into the thread record; writes only when they changed.
    async fn persist_stats(&self, context: &RenderContext, stats: &ThreadStats) -> ThreadMetadata {
        let key = context.thread_record_key();
        let mut meta = read_one(self.storage.as_ref(), &key)
            .await
            .map(|v| ThreadMetadata::from_json(&v))
            .unwrap_or_default();
        if meta.apply_stats(stats) {
            write_one(self.storage.as_ref(), &key, meta.to_json()).await;
        }
        meta
    }

    fn refresh_header(
        &self,
        context: &RenderContext,
        config: &Config,
        meta: &ThreadMetadata,
        stats: &ThreadStats,
    ) {
        let mut doc = self.page.document_mut();
        let result = if config.meta_toolbar_enabled {
            header::render_header(&mut doc, context.container, meta, stats).map(|_| ())
        } else {
            header::remove_header(&mut doc)
        };
        if let Err(e) = result {
            tracing::warn!("Thread header refresh failed: {}", e);
        }
    }

    fn refresh_overview(
        &self,
        doc: &mut Document,
        registry: &mut MessageMetaRegistry,
        focus: &FocusService,
        config: &Config,
    ) {
        let mut overview = self.overview.borrow_mut();
        if !config.overview_enabled {
            if let Err(e) = overview.reset(doc) {
                tracing::warn!("Overview reset failed: {}", e);
            }
            return;
        }
        let mut items = Vec::new();
        registry.for_each(doc, |el, meta| {
            let role = meta.adapter.as_ref().map(|a| a.role.clone()).unwrap_or_default();
            items.push((
                el,
                role,
                meta.value.is_starred(),
                !meta.value.tags().is_empty(),
                focus.is_message_focused(meta),
            ));
        });
        let entries = layout_entries(doc, items);
        if let Err(e) = overview.update(doc, entries) {
            tracing::warn!("Overview update failed: {}", e);
        }
    }

    // =========================================================================
    // Focus input
    // =========================================================================

    pub fn set_search_query(&self, query: &str) {
        self.focus.borrow_mut().set_search_query(query);
        self.request_render();
    }

    pub fn toggle_tag_filter(&self, tag: &str) -> bool {
        let selected = self.focus.borrow_mut().toggle_tag(tag);
        self.request_render();
        selected
    }

    pub fn clear_tag_filter(&self) {
        self.focus.borrow_mut().clear_tags();
        self.request_render();
    }

    /// Take new feature flags, then re-render.
    pub fn apply_config(&self, config: &Config) {
        self.focus.borrow_mut().apply_config(config);
        self.request_render();
    }

    // =========================================================================
    // Metadata edits (read-modify-write, then re-render)
    // =========================================================================

    fn message_record_key(&self, element: NodeId) -> Option<String> {
        let context = self.context()?;
        let cached = self
            .registry
            .borrow()
            .get(element)
            .map(|m| m.key.clone())
            .filter(|k| !k.is_empty());
        let key = match cached {
            Some(key) => key,
            None => {
                let doc = self.page.document();
                if !doc.is_connected(element) {
                    return None;
                }
                derive_message_key(&doc, element, context.adapter.native_id_attr())
            }
        };
        Some(message_storage_key(&context.thread_key, &key))
    }

    async fn update_message(
        &self,
        element: NodeId,
        edit: impl FnOnce(&mut MessageValue),
    ) -> Option<MessageValue> {
        let key = self.message_record_key(element)?;
        let mut value = read_one(self.storage.as_ref(), &key)
            .await
            .map(|v| MessageValue::from_json(&v))
            .unwrap_or_default();
        edit(&mut value);
        if !write_one(self.storage.as_ref(), &key, value.to_json()).await {
            return None;
        }
        self.request_render();
        Some(value)
    }

    /// Returns the new star state, or `None` if the message is unknown or
    /// the write failed.
    pub async fn toggle_star(&self, element: NodeId) -> Option<bool> {
        self.update_message(element, |v| {
            v.toggle_star();
        })
        .await
        .map(|v| v.is_starred())
    }

    pub async fn set_tags(&self, element: NodeId, tags: &[String]) -> Option<MessageValue> {
        self.update_message(element, |v| v.set_tags(tags)).await
    }

    pub async fn set_note(&self, element: NodeId, note: &str) -> Option<MessageValue> {
        self.update_message(element, |v| v.set_note(note)).await
    }

    async fn update_thread(&self, edit: impl FnOnce(&mut ThreadMetadata)) -> Option<ThreadMetadata> {
        let key = self.context()?.thread_record_key();
        let mut meta = read_one(self.storage.as_ref(), &key)
            .await
            .map(|v| ThreadMetadata::from_json(&v))
            .unwrap_or_default();
        edit(&mut meta);
        if !write_one(self.storage.as_ref(), &key, meta.to_json()).await {
            return None;
        }
        self.request_render();
        Some(meta)
    }

    pub async fn set_thread_name(&self, name: &str) -> Option<ThreadMetadata> {
        let name = name.trim().to_string();
        self.update_thread(|m| m.name = (!name.is_empty()).then_some(name))
            .await
    }

    pub async fn toggle_thread_star(&self) -> Option<bool> {
        self.update_thread(|m| m.starred = (!m.is_starred()).then_some(true))
            .await
            .map(|m| m.is_starred())
    }
}

fn render_message(
    doc: &mut Document,
    config: &Config,
    focus: &FocusService,
    meta: &MessageMeta,
) -> Result<(), DomError> {
    let Some(adapter) = &meta.adapter else {
        return Ok(());
    };
    if !config.message_toolbar_enabled {
        return toolbar::remove_toolbar(doc, adapter.element);
    }
    let view = ToolbarView {
        key: &meta.key,
        pair_index: meta.pair_index,
        char_count: adapter.char_count(),
        value: &meta.value,
        mode: focus.mode(),
        focused: focus.is_message_focused(meta),
    };
    toolbar::render_toolbar(doc, adapter.element, &view).map(|_| ())
}
