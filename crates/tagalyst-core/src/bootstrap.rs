//! Activation lifecycle and the cooperative run loop.
//!
//! `activate` brings the engine up for the current location, `teardown`
//! takes everything down again, and `run_until` drives frames, mutations
//! and URL changes on the current thread until told to stop.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use serde::Serialize;

use crate::adapters::{AdapterRegistry, ThreadAdapter};
use crate::config::{Config, ConfigService, CoreConfig, SubscriptionId};
use crate::dom::{HostPage, NodeId};
use crate::keyboard::{KeyInput, KeyOutcome, KeyboardController};
use crate::page::{PageInfo, PageKind};
use crate::render::{RenderContext, ThreadRenderService};
use crate::scheduler::{FrameClock, RenderScheduler};
use crate::sidebar;
use crate::storage::StorageGateway;
use crate::ui::{self, notice};
use crate::watcher::{DomWatcher, WatchEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveReason {
    /// The location changed while we were waiting
    Superseded,
    ConfigUnavailable,
    NoAdapter,
    NoTranscript,
    NotAThread(PageKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Active { thread_key: String },
    Inactive(InactiveReason),
}

impl Activation {
    pub fn is_active(&self) -> bool {
        matches!(self, Activation::Active { .. })
    }
}

pub struct Bootstrap {
    page: Rc<HostPage>,
    storage: Rc<dyn StorageGateway>,
    core: CoreConfig,
    adapters: AdapterRegistry,
    config: Rc<ConfigService>,
    scheduler: Rc<RenderScheduler>,
    service: Rc<ThreadRenderService>,
    keyboard: KeyboardController,
    watcher: DomWatcher,
    config_subscription: Cell<Option<SubscriptionId>>,
    sidebar_dirty: Rc<Cell<bool>>,
    active: RefCell<Option<PageInfo>>,
    /// Bumped by every activation so a slower one can tell it lost
    generation: Cell<u64>,
}

impl Bootstrap {
    pub fn new(page: Rc<HostPage>, storage: Rc<dyn StorageGateway>, core: CoreConfig) -> Self {
        let config = Rc::new(ConfigService::new(Rc::clone(&storage)));
        let scheduler = Rc::new(RenderScheduler::new(core.slow_render_threshold));
        let service = ThreadRenderService::new(
            Rc::clone(&page),
            Rc::clone(&storage),
            Rc::clone(&config),
            Rc::clone(&scheduler),
        );
        let keyboard = KeyboardController::new(Rc::clone(&service));
        let watcher = DomWatcher::new(Rc::clone(&page), core.url_poll_interval);
        Self {
            page,
            storage,
            core,
            adapters: AdapterRegistry::with_defaults(),
            config,
            scheduler,
            service,
            keyboard,
            watcher,
            config_subscription: Cell::new(None),
            sidebar_dirty: Rc::new(Cell::new(false)),
            active: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn page(&self) -> &Rc<HostPage> {
        &self.page
    }

    pub fn config(&self) -> &Rc<ConfigService> {
        &self.config
    }

    pub fn scheduler(&self) -> &Rc<RenderScheduler> {
        &self.scheduler
    }

    pub fn service(&self) -> &Rc<ThreadRenderService> {
        &self.service
    }

    pub fn watcher(&self) -> &DomWatcher {
        &self.watcher
    }

    pub fn keyboard(&self) -> &KeyboardController {
        &self.keyboard
    }

    /// Page the engine is currently active on
    pub fn active_page(&self) -> Option<PageInfo> {
        self.active.borrow().clone()
    }

    fn superseded(&self, generation: u64, location: &str) -> bool {
        self.generation.get() != generation || self.page.location() != location
    }

    async fn locate_root(&self, adapter: &Rc<dyn ThreadAdapter>) -> Option<NodeId> {
        let root = adapter.transcript_root(&self.page.document());
        if root.is_some() {
            return root;
        }
        tracing::debug!("Transcript root not found; retrying in {:?}", self.core.root_retry_delay);
        tokio::time::sleep(self.core.root_retry_delay).await;
        adapter.transcript_root(&self.page.document())
    }

    /// Bring the engine up for the current location.
    pub async fn activate(&self) -> Activation {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let location = self.page.location();
        self.watcher.watch_url();

        if !self.core.startup_delay.is_zero() {
            tokio::time::sleep(self.core.startup_delay).await;
        }
        if self.superseded(generation, &location) {
            tracing::debug!("Activation for {} superseded during startup delay", location);
            return Activation::Inactive(InactiveReason::Superseded);
        }

        let config = match self.config.load().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Activation aborted: {}", e);
                self.teardown();
                let message = format!("Tagalyst could not load its settings: {}", e);
                if let Err(e) = notice::show_notice(&mut self.page.document_mut(), &message) {
                    tracing::warn!("Failed to show notice: {}", e);
                }
                return Activation::Inactive(InactiveReason::ConfigUnavailable);
            }
        };
        self.teardown();

        let Some(adapter) = self.adapters.select(&location) else {
            tracing::debug!("No adapter for {}", location);
            return Activation::Inactive(InactiveReason::NoAdapter);
        };
        self.refresh_sidebar_with(&config).await;

        let Some(root) = self.locate_root(&adapter).await else {
            tracing::info!("No transcript root on {}", location);
            return Activation::Inactive(InactiveReason::NoTranscript);
        };
        if self.superseded(generation, &location) {
            return Activation::Inactive(InactiveReason::Superseded);
        }
        let info = PageInfo::from_location(&location);
        if !info.kind.is_thread() {
            return Activation::Inactive(InactiveReason::NotAThread(info.kind));
        }

        self.service.focus().borrow_mut().apply_config(&config);
        self.service.attach(RenderContext {
            container: root,
            thread_id: info.thread_id.clone(),
            thread_key: info.thread_key.clone(),
            adapter: Rc::clone(&adapter),
        });
        self.keyboard.set_enabled(true);
        self.subscribe_config();

        let weak = Rc::downgrade(&self.service);
        self.watcher.on_mutations(Rc::new(move |records| {
            tracing::debug!("{} host mutations; scheduling render", records.len());
            if let Some(service) = weak.upgrade() {
                service.request_render();
            }
        }));
        let weak = Rc::downgrade(&self.service);
        self.watcher.on_root_change(Rc::new(move |previous, next| {
            let (Some(_), Some(next)) = (previous, next) else {
                return;
            };
            let Some(service) = weak.upgrade() else {
                return;
            };
            if let Some(mut context) = service.context() {
                context.container = next;
                service.attach(context);
                service.request_render();
            }
        }));
        self.watcher.watch_container(&adapter, Some(root));

        tracing::info!("Activated {} on {} ({:?})", adapter.name(), info.thread_key, info.kind);
        let thread_key = info.thread_key.clone();
        *self.active.borrow_mut() = Some(info);
        self.service.render_now().await;
        if self.superseded(generation, &location) {
            return Activation::Inactive(InactiveReason::Superseded);
        }
        Activation::Active { thread_key }
    }

    fn subscribe_config(&self) {
        let weak = Rc::downgrade(&self.service);
        let sidebar_dirty = Rc::clone(&self.sidebar_dirty);
        let id = self.config.subscribe(Rc::new(move |config: &Config| {
            sidebar_dirty.set(true);
            if let Some(service) = weak.upgrade() {
                service.apply_config(config);
            }
        }));
        if let Some(previous) = self.config_subscription.replace(Some(id)) {
            self.config.unsubscribe(previous);
        }
    }

    /// Remove everything we injected and drop all per-thread state.
    /// Safe to call repeatedly.
    pub fn teardown(&self) {
        if let Some(id) = self.config_subscription.take() {
            self.config.unsubscribe(id);
        }
        self.watcher.disconnect();
        self.service.detach();
        self.keyboard.reset();
        self.keyboard.set_enabled(false);
        self.service.focus().borrow_mut().reset();
        self.service.registry().borrow_mut().clear();
        self.service.overview().borrow_mut().forget();
        let removed = ui::remove_all(&mut self.page.document_mut());
        if removed > 0 {
            tracing::debug!("Teardown removed {} injected nodes", removed);
        }
        self.active.borrow_mut().take();
    }

    pub async fn refresh_sidebar(&self) -> usize {
        let config = self.config.current();
        self.refresh_sidebar_with(&config).await
    }

    async fn refresh_sidebar_with(&self, config: &Config) -> usize {
        sidebar::refresh_labels(&self.page, self.storage.as_ref(), config).await
    }

    /// Change the location and re-activate, as a host SPA navigation would.
    pub async fn navigate(&self, location: &str) -> Activation {
        self.page.set_location(location);
        self.activate().await
    }

    pub async fn handle_key(&self, input: &KeyInput) -> KeyOutcome {
        self.keyboard.handle(input).await
    }

    /// Drive frames, mutations and navigation until `shutdown` resolves.
    pub async fn run_until<F: Future<Output = ()>>(&self, shutdown: F) {
        let mut clock = FrameClock::new(self.core.frame_interval);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.scheduler.wait_scheduled() => {
                    clock.tick().await;
                    self.scheduler.run_frame().await;
                }
                event = self.watcher.next_event() => {
                    match event {
                        WatchEvent::Navigated { from, to } => {
                            tracing::debug!("Re-activating after navigation {} -> {}", from, to);
                            self.activate().await;
                        }
                        WatchEvent::RootChanged { to, .. } => {
                            tracing::debug!("Following remounted transcript root {:?}", to);
                        }
                        WatchEvent::Mutations(_) => {}
                    }
                }
            }
            if self.sidebar_dirty.replace(false) {
                self.refresh_sidebar().await;
            }
        }
        tracing::info!("Run loop stopped");
    }

    pub async fn run(&self) {
        self.run_until(std::future::pending()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::EXT_ATTR;
    use crate::fixtures::{append_turn, chat_page, Turn};
    use crate::storage::{MemoryStorage, StorageError, StorageRecord};
    use crate::ui::toolbar::TOOLBAR;
    use async_trait::async_trait;
    use std::time::Duration;

    fn toolbar_count(page: &HostPage) -> usize {
        let doc = page.document();
        doc.descendant_elements(doc.root())
            .into_iter()
            .filter(|n| doc.attr(*n, EXT_ATTR) == Some(TOOLBAR))
            .count()
    }

    fn injected_count(page: &HostPage) -> usize {
        let doc = page.document();
        doc.descendant_elements(doc.root())
            .into_iter()
            .filter(|n| doc.has_attr(*n, EXT_ATTR))
            .count()
    }

    fn bootstrap(location: &str, turns: &[Turn]) -> (Bootstrap, NodeId) {
        let (page, main) = chat_page(location, turns).unwrap();
        let boot = Bootstrap::new(
            Rc::new(page),
            Rc::new(MemoryStorage::new()),
            CoreConfig::immediate(),
        );
        (boot, main)
    }

    struct FailingStorage;

    #[async_trait(?Send)]
    impl StorageGateway for FailingStorage {
        async fn read(&self, _keys: &[String]) -> Result<StorageRecord, StorageError> {
            Err(StorageError::Read("unavailable".to_string()))
        }

        async fn write(&self, _record: StorageRecord) -> Result<(), StorageError> {
            Err(StorageError::Write("unavailable".to_string()))
        }

        async fn clear(&self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_activate_thread_page() {
        let (boot, _) = bootstrap("https://chatgpt.com/c/t1", &[Turn::user("q"), Turn::assistant("r")]);
        let activation = boot.activate().await;
        assert_eq!(activation, Activation::Active { thread_key: "t1".to_string() });
        assert_eq!(toolbar_count(boot.page()), 2);
        assert!(boot.service().is_attached());
        assert_eq!(boot.page().document().observer_count(), 1);
        assert_eq!(boot.active_page().unwrap().kind, PageKind::Thread);
    }

    #[tokio::test]
    async fn test_inactive_reasons() {
        let (boot, _) = bootstrap("https://chatgpt.com/g/g-p-1/project", &[Turn::user("q")]);
        assert_eq!(
            boot.activate().await,
            Activation::Inactive(InactiveReason::NotAThread(PageKind::Project))
        );
        assert_eq!(toolbar_count(boot.page()), 0);

        let (boot, _) = bootstrap("file:///tmp/chat.html", &[Turn::user("q")]);
        assert_eq!(boot.activate().await, Activation::Inactive(InactiveReason::NoAdapter));

        let (boot, _) = bootstrap("https://chatgpt.com/c/t1", &[]);
        assert_eq!(boot.activate().await, Activation::Inactive(InactiveReason::NoTranscript));
    }

    #[tokio::test]
    async fn test_config_failure_shows_notice() {
        let (page, _) = chat_page("https://chatgpt.com/c/t1", &[Turn::user("q")]).unwrap();
        let boot = Bootstrap::new(Rc::new(page), Rc::new(FailingStorage), CoreConfig::immediate());
        assert_eq!(
            boot.activate().await,
            Activation::Inactive(InactiveReason::ConfigUnavailable)
        );
        let text = notice::notice_text(&boot.page().document()).unwrap();
        assert!(text.contains("could not load its settings"));
        assert_eq!(toolbar_count(boot.page()), 0);
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let (boot, _) = bootstrap("https://chatgpt.com/c/t1", &[Turn::user("q"), Turn::assistant("r")]);
        boot.activate().await;
        assert!(injected_count(boot.page()) > 0);
        boot.teardown();
        boot.teardown();
        assert_eq!(injected_count(boot.page()), 0);
        assert_eq!(boot.page().document().observer_count(), 0);
        assert!(!boot.service().is_attached());
        assert!(boot.active_page().is_none());
    }

    #[tokio::test]
    async fn test_navigate_away_tears_down() {
        let (boot, _) = bootstrap("https://chatgpt.com/c/t1", &[Turn::user("q")]);
        boot.activate().await;
        let activation = boot.navigate("https://chatgpt.com/").await;
        assert_eq!(
            activation,
            Activation::Inactive(InactiveReason::NotAThread(PageKind::Unknown))
        );
        assert_eq!(injected_count(boot.page()), 0);
    }

    #[tokio::test]
    async fn test_run_loop_renders_new_messages() {
        let (boot, main) = bootstrap("https://chatgpt.com/c/t1", &[Turn::user("q"), Turn::assistant("r")]);
        boot.activate().await;
        append_turn(&mut boot.page().document_mut(), main, &Turn::user("follow-up")).unwrap();
        boot.run_until(tokio::time::sleep(Duration::from_millis(50))).await;
        assert_eq!(toolbar_count(boot.page()), 3);
        assert!(boot.service().passes() >= 2);
    }

    #[tokio::test]
    async fn test_run_loop_follows_remounted_root() {
        let (boot, old_main) = bootstrap("https://chatgpt.com/c/t1", &[Turn::user("q"), Turn::assistant("r")]);
        boot.activate().await;
        let new_main = {
            let mut doc = boot.page().document_mut();
            doc.remove(old_main).unwrap();
            let main = doc.create_element("main");
            let body = doc.body();
            doc.append_child(body, main).unwrap();
            for turn in [Turn::user("q"), Turn::assistant("r"), Turn::user("again")] {
                append_turn(&mut doc, main, &turn).unwrap();
            }
            main
        };
        boot.run_until(tokio::time::sleep(Duration::from_millis(80))).await;

        assert_eq!(boot.watcher().root(), Some(new_main));
        assert_eq!(boot.service().context().unwrap().container, new_main);
        let doc = boot.page().document();
        let under_new_root = doc
            .descendant_elements(new_main)
            .into_iter()
            .filter(|n| doc.attr(*n, EXT_ATTR) == Some(TOOLBAR))
            .count();
        assert_eq!(under_new_root, 3);
    }

    #[tokio::test]
    async fn test_handle_key_follows_lifecycle() {
        let (boot, main) = bootstrap(
            "https://chatgpt.com/c/t1",
            &[Turn::user("alpha question"), Turn::assistant("beta answer"), Turn::user("alpha again")],
        );
        boot.activate().await;
        boot.service().set_search_query("alpha");
        let messages = boot.page().document().element_children(main);

        let outcome = boot.handle_key(&KeyInput::alt("j")).await;
        assert_eq!(outcome, KeyOutcome::Moved { index: 0, element: messages[0] });
        let outcome = boot.handle_key(&KeyInput::alt("End")).await;
        assert_eq!(outcome, KeyOutcome::Moved { index: 1, element: messages[2] });

        boot.teardown();
        assert_eq!(boot.handle_key(&KeyInput::alt("j")).await, KeyOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_config_change_rerenders() {
        let (boot, _) = bootstrap("https://chatgpt.com/c/t1", &[Turn::user("q")]);
        boot.activate().await;
        boot.config().set_flag("messageToolbarEnabled", false).await.unwrap();
        assert!(boot.scheduler().is_scheduled());
        boot.scheduler().run_frame().await;
        assert_eq!(toolbar_count(boot.page()), 0);
    }
}
