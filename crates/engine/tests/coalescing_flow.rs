use async_trait::async_trait;
use canvas_engine::{
    BookmarkChanges, BookmarkEvent, BookmarkStore, ChangeKind, EngineConfig, EngineError,
    LoadStatus, MemoryStore, ProjectionEngine, Result,
};
use canvas_protocol::{Category, ProjectionState, RawNode};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::sleep;

fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(RawNode::folder(
        "0",
        "",
        vec![
            RawNode::folder(
                "1",
                "Bookmarks bar",
                vec![RawNode::bookmark("3", "GitHub", "https://github.com").added_at(1)],
            ),
            RawNode::folder("2", "Other bookmarks", vec![]),
        ],
    )))
}

async fn started(store: &Arc<MemoryStore>) -> Arc<ProjectionEngine> {
    let engine = ProjectionEngine::start(
        Arc::clone(store) as Arc<dyn BookmarkStore>,
        EngineConfig::default(),
        ProjectionState::default().with_category(Category::All),
    );
    engine.refresh_from_source().await.unwrap();
    engine
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_costs_one_reload_and_one_push() {
    let store = seeded_store();
    let engine = started(&store).await;
    let mut updates = engine.subscribe();

    for i in 0..10 {
        store
            .create(None, &format!("item {i}"), &format!("https://site{i}.org"))
            .await
            .unwrap();
    }
    sleep(Duration::from_millis(400)).await;

    let pushed = updates.try_recv().unwrap();
    assert_eq!(pushed[0].len(), 11);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(store.read_count(), 2);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(store.read_count(), 2);
    assert_eq!(engine.coalescer_health().unwrap().refreshes, 1);
}

#[tokio::test(start_paused = true)]
async fn whole_tree_import_is_picked_up_after_the_window() {
    let store = seeded_store();
    let engine = started(&store).await;
    let mut updates = engine.subscribe();

    store
        .replace_tree(RawNode::folder(
            "0",
            "",
            vec![
                RawNode::folder(
                    "1",
                    "Bookmarks bar",
                    vec![
                        RawNode::bookmark("7", "Docs", "https://docs.rs"),
                        RawNode::bookmark("8", "Crates", "https://crates.io"),
                    ],
                ),
                RawNode::folder("2", "Other bookmarks", vec![]),
            ],
        ))
        .await;
    sleep(Duration::from_millis(100)).await;
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));

    sleep(Duration::from_millis(300)).await;
    let pushed = updates.try_recv().unwrap();
    let ids: Vec<&str> = pushed[0].records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["7", "8"]);
    assert_eq!(store.read_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn later_notification_restarts_the_window() {
    let store = seeded_store();
    let engine = started(&store).await;
    let mut updates = engine.subscribe();

    engine.notify_change(ChangeKind::Changed).await.unwrap();
    sleep(Duration::from_millis(200)).await;
    engine.notify_change(ChangeKind::Moved).await.unwrap();
    sleep(Duration::from_millis(200)).await;
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(store.read_count(), 1);

    sleep(Duration::from_millis(200)).await;
    assert!(updates.try_recv().is_ok());
    assert_eq!(store.read_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_reload_keeps_projection_and_next_burst_still_fires() {
    let store = seeded_store();
    let engine = started(&store).await;
    let before = engine.projection();
    let mut updates = engine.subscribe();

    store.set_available(false);
    engine.notify_change(ChangeKind::Changed).await.unwrap();
    sleep(Duration::from_millis(400)).await;
    assert!(matches!(engine.status(), LoadStatus::Failed { .. }));
    assert!(Arc::ptr_eq(&before, &engine.projection()));
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(engine.coalescer_health().unwrap().consecutive_failures, 1);

    store.set_available(true);
    store.create(Some("2"), "Later", "https://later.net").await.unwrap();
    sleep(Duration::from_millis(400)).await;
    assert_eq!(updates.try_recv().unwrap()[0].len(), 2);
    assert!(matches!(engine.status(), LoadStatus::Loaded { records: 2, .. }));
}

#[tokio::test(start_paused = true)]
async fn teardown_turns_armed_refresh_into_noop() {
    let store = seeded_store();
    let engine = started(&store).await;
    let mut updates = engine.subscribe();

    store.remove("3").await.unwrap();
    sleep(Duration::from_millis(10)).await;
    engine.teardown();
    sleep(Duration::from_millis(500)).await;

    assert_eq!(store.read_count(), 1);
    assert!(matches!(updates.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(engine.projection()[0].len(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_engine_stops_refreshes() {
    let store = seeded_store();
    let engine = started(&store).await;
    store.remove("3").await.unwrap();
    drop(engine);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(store.read_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn auto_refresh_off_ignores_store_events() {
    let store = seeded_store();
    let engine = ProjectionEngine::start(
        Arc::clone(&store) as Arc<dyn BookmarkStore>,
        EngineConfig::default().with_auto_refresh(false),
        ProjectionState::default(),
    );
    engine.refresh_from_source().await.unwrap();
    store.remove("3").await.unwrap();
    sleep(Duration::from_millis(500)).await;
    assert_eq!(store.read_count(), 1);
    assert!(matches!(
        engine.notify_change(ChangeKind::Removed).await,
        Err(EngineError::Closed)
    ));
}

/// Store whose `get_tree` never answers.
struct StalledStore {
    events: broadcast::Sender<BookmarkEvent>,
}

#[async_trait]
impl BookmarkStore for StalledStore {
    async fn get_tree(&self) -> Result<RawNode> {
        sleep(Duration::from_secs(3_600)).await;
        Ok(RawNode::folder("0", "", vec![]))
    }

    fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent> {
        self.events.subscribe()
    }

    async fn create(&self, _: Option<&str>, _: &str, _: &str) -> Result<RawNode> {
        Err(EngineError::Other("stalled".to_string()))
    }

    async fn update(&self, _: &str, _: BookmarkChanges) -> Result<RawNode> {
        Err(EngineError::Other("stalled".to_string()))
    }

    async fn remove(&self, _: &str) -> Result<()> {
        Err(EngineError::Other("stalled".to_string()))
    }

    async fn search(&self, _: &str) -> Result<Vec<RawNode>> {
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_source_times_out() {
    let (events, _) = broadcast::channel(4);
    let engine = ProjectionEngine::new(
        Arc::new(StalledStore { events }),
        EngineConfig::default().with_load_timeout(Duration::from_secs(2)),
        ProjectionState::default(),
    );
    let err = engine.refresh_from_source().await.unwrap_err();
    assert!(matches!(err, EngineError::Timeout(_)));
    match engine.status() {
        LoadStatus::Failed { error, .. } => assert!(error.contains("did not answer")),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(engine.projection().is_empty());
}
