use std::rc::Rc;

use serde_json::json;
use tagalyst_core::adapters::{HostProfile, MarkedThreadAdapter};
use tagalyst_core::dom::Layout;
use tagalyst_core::fixtures::{chat_page, Turn};
use tagalyst_core::render::RenderContext;
use tagalyst_core::{
    Config, ConfigService, FocusMode, FocusService, HostPage, MemoryStorage, NodeId,
    RenderScheduler, ThreadRenderService,
};

fn numbered_turns(n: usize) -> Vec<Turn> {
    (0..n)
        .map(|i| {
            let text = format!("turn number {}", i);
            let turn = if i % 2 == 0 { Turn::user(&text) } else { Turn::assistant(&text) };
            turn.with_id(&format!("m{}", i))
        })
        .collect()
}

async fn rendered(turns: &[Turn], storage: MemoryStorage) -> (Rc<HostPage>, NodeId, Rc<ThreadRenderService>) {
    let (page, main) = chat_page("https://chatgpt.com/c/t", turns).unwrap();
    let page = Rc::new(page);
    let storage = Rc::new(storage);
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
    service.render_now().await.unwrap();
    (page, main, service)
}

fn match_keys(page: &HostPage, service: &ThreadRenderService) -> Vec<String> {
    let doc = page.document();
    let focus = service.focus().borrow();
    focus
        .get_matches(&mut service.registry().borrow_mut(), &doc)
        .iter()
        .map(|m| m.key.clone())
        .collect()
}

#[tokio::test]
async fn stars_mode_returns_every_tenth_message_in_position_order() {
    for n in [1usize, 9, 10, 11, 25, 40] {
        let storage = MemoryStorage::new();
        for i in (0..n).step_by(10) {
            storage.insert(&format!("t:m{}", i), json!({"starred": true}));
        }
        let (page, _, service) = rendered(&numbered_turns(n), storage).await;
        let expected: Vec<String> = (0..n).step_by(10).map(|i| format!("m{}", i)).collect();
        assert_eq!(expected.len(), n.div_ceil(10));
        assert_eq!(match_keys(&page, &service), expected, "n = {}", n);
    }
}

#[tokio::test]
async fn matches_follow_vertical_position_not_insertion_order() {
    let storage = MemoryStorage::new();
    for i in [0, 10, 20] {
        storage.insert(&format!("t:m{}", i), json!({"starred": true}));
    }
    let (page, main, service) = rendered(&numbered_turns(21), storage).await;
    {
        let mut doc = page.document_mut();
        let messages = doc.element_children(main);
        let total = messages.len();
        for (i, message) in messages.into_iter().enumerate() {
            let layout = Layout {
                top: Some((total - i) as f64 * 50.0),
                height: Some(50.0),
                scrollable: false,
            };
            doc.set_layout(message, layout).unwrap();
        }
    }
    assert_eq!(match_keys(&page, &service), vec!["m20", "m10", "m0"]);
}

#[test]
fn precedence_moves_between_tags_and_search_both_ways() {
    let mut focus = FocusService::new(&Config::default());
    assert_eq!(focus.mode(), FocusMode::Stars);
    focus.toggle_tag("x");
    assert_eq!(focus.mode(), FocusMode::Tags);

    focus.set_search_query("needle");
    assert_eq!(focus.mode(), FocusMode::Search);
    focus.set_search_query("");
    assert_eq!(focus.mode(), FocusMode::Tags);

    focus.toggle_tag("x");
    assert_eq!(focus.mode(), FocusMode::Stars);
}

#[test]
fn disabled_flags_fall_back_to_stars() {
    let config = Config {
        search_enabled: false,
        tags_enabled: false,
        ..Config::default()
    };
    let mut focus = FocusService::new(&config);
    focus.toggle_tag("x");
    focus.set_search_query("needle");
    assert_eq!(focus.mode(), FocusMode::Stars);
}

#[test]
fn adjust_nav_clamps_without_wrapping() {
    let mut focus = FocusService::new(&Config::default());
    let forward: Vec<Option<usize>> = (0..7).map(|_| focus.adjust_nav(1, 5)).collect();
    assert_eq!(
        forward,
        vec![Some(0), Some(1), Some(2), Some(3), Some(4), Some(4), Some(4)]
    );
    let back: Vec<Option<usize>> = (0..6).map(|_| focus.adjust_nav(-1, 5)).collect();
    assert_eq!(back, vec![Some(3), Some(2), Some(1), Some(0), Some(0), Some(0)]);
    assert_eq!(focus.adjust_nav(-100, 5), Some(0));
    assert_eq!(focus.adjust_nav(100, 5), Some(4));
    assert_eq!(focus.adjust_nav(1, 0), None);
    assert_eq!(focus.nav_index(), None);
}
