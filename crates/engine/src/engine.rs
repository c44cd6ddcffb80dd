use crate::coalescer::{ChangeCoalescer, CoalescerConfig, CoalescerHealth, RefreshTarget};
use crate::store::current_unix_ms;
use crate::{BookmarkChanges, BookmarkStore, ChangeKind, EngineError, Result};
use async_trait::async_trait;
use canvas_protocol::{
    Category, FlatRecord, Group, Labels, Language, ProjectionState, RawNode, ViewMode,
};
use canvas_search::project;
use canvas_tree::{recent_bookmarks, Flattener, TreeStats};
use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time;

/// Current grouped output. Replaced wholesale on every recomputation.
pub type Projection = Arc<Vec<Group>>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period before store notifications turn into a refresh.
    pub debounce: Duration,
    /// Upper bound on a single `get_tree` call.
    pub load_timeout: Duration,
    /// Subscribe to store notifications on start.
    pub auto_refresh: bool,
    pub language: Language,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            load_timeout: Duration::from_secs(10),
            auto_refresh: true,
            language: Language::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub const fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    #[must_use]
    pub const fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Nothing loaded yet.
    Idle,
    Loaded { records: usize, at_unix_ms: u64 },
    /// The last load failed; the previous projection is still served.
    Failed { error: String, at_unix_ms: u64 },
}

struct EngineState {
    view: ProjectionState,
    language: Language,
    labels: Labels,
    records: Arc<Vec<FlatRecord>>,
    projection: Projection,
    stats: TreeStats,
    status: LoadStatus,
}

impl EngineState {
    fn recompute(&mut self) -> Projection {
        self.projection = Arc::new(project(&self.records, &self.view, &self.labels));
        Arc::clone(&self.projection)
    }
}

/// Owns the current (category, query, view) and the last flat snapshot, and
/// recomputes the grouped projection whenever either changes.
///
/// Mode changes recompute synchronously from the cached records. Store
/// notifications go through a [`ChangeCoalescer`], so a burst of edits costs
/// one reload. Every recomputation is pushed to [`subscribe`](Self::subscribe) receivers.
pub struct ProjectionEngine {
    store: Arc<dyn BookmarkStore>,
    config: EngineConfig,
    state: Mutex<EngineState>,
    updates: broadcast::Sender<Projection>,
    live: AtomicBool,
    coalescer: Mutex<Option<ChangeCoalescer>>,
}

impl ProjectionEngine {
    /// Engine without store subscription. Refreshes only happen on request.
    pub fn new(
        store: Arc<dyn BookmarkStore>,
        config: EngineConfig,
        initial: ProjectionState,
    ) -> Arc<Self> {
        let (updates, _) = broadcast::channel(32);
        let language = config.language;
        Arc::new(Self {
            store,
            state: Mutex::new(EngineState {
                view: initial,
                language,
                labels: Labels::for_language(language),
                records: Arc::new(Vec::new()),
                projection: Arc::new(Vec::new()),
                stats: TreeStats::default(),
                status: LoadStatus::Idle,
            }),
            config,
            updates,
            live: AtomicBool::new(true),
            coalescer: Mutex::new(None),
        })
    }

    /// Engine wired to the store's notifications when `auto_refresh` is set.
    /// Must be called inside a tokio runtime.
    pub fn start(
        store: Arc<dyn BookmarkStore>,
        config: EngineConfig,
        initial: ProjectionState,
    ) -> Arc<Self> {
        let engine = Self::new(store, config, initial);
        if engine.config.auto_refresh {
            engine.attach_coalescer();
        }
        engine
    }

    fn attach_coalescer(self: &Arc<Self>) {
        let coalescer = ChangeCoalescer::start(
            Arc::downgrade(self),
            Some(self.store.subscribe()),
            CoalescerConfig {
                window: self.config.debounce,
            },
        );
        *self.coalescer_slot() = Some(coalescer);
        debug!("Auto-refresh enabled ({:?} window)", self.config.debounce);
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn coalescer_slot(&self) -> MutexGuard<'_, Option<ChangeCoalescer>> {
        self.coalescer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, projection: &Projection) {
        // Nobody listening is not an error.
        let _ = self.updates.send(Arc::clone(projection));
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn projection(&self) -> Projection {
        Arc::clone(&self.lock().projection)
    }

    #[must_use]
    pub fn state(&self) -> ProjectionState {
        self.lock().view.clone()
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.lock().view.category
    }

    #[must_use]
    pub fn query(&self) -> String {
        self.lock().view.query.clone()
    }

    #[must_use]
    pub fn view(&self) -> ViewMode {
        self.lock().view.view
    }

    #[must_use]
    pub fn language(&self) -> Language {
        self.lock().language
    }

    #[must_use]
    pub fn records(&self) -> Arc<Vec<FlatRecord>> {
        Arc::clone(&self.lock().records)
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lock().status.clone()
    }

    #[must_use]
    pub fn stats(&self) -> TreeStats {
        self.lock().stats
    }

    /// Newest `limit` bookmarks regardless of category or query.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<FlatRecord> {
        recent_bookmarks(&self.records(), limit)
    }

    /// Every recomputation, mode change or refresh, is pushed here.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Projection> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn coalescer_health(&self) -> Option<CoalescerHealth> {
        self.coalescer_slot()
            .as_ref()
            .map(ChangeCoalescer::health_snapshot)
    }

    pub fn set_category(&self, category: Category) -> Projection {
        let projection = {
            let mut state = self.lock();
            state.view.category = category;
            state.recompute()
        };
        debug!("Category -> {category}");
        self.publish(&projection);
        projection
    }

    pub fn set_query(&self, query: impl Into<String>) -> Projection {
        let projection = {
            let mut state = self.lock();
            state.view.query = query.into();
            state.recompute()
        };
        self.publish(&projection);
        projection
    }

    /// Presentation only: neither recomputes nor pushes.
    pub fn set_view(&self, view: ViewMode) {
        self.lock().view.view = view;
    }

    /// Relabel synthetic groups. Untitled bookmarks pick up the new
    /// placeholder on the next refresh.
    pub fn set_language(&self, language: Language) -> Projection {
        let projection = {
            let mut state = self.lock();
            state.language = language;
            state.labels = Labels::for_language(language);
            state.recompute()
        };
        self.publish(&projection);
        projection
    }

    /// Reload the tree from the store and recompute.
    ///
    /// On failure the previous records and projection stay in place, the
    /// status flips to [`LoadStatus::Failed`] and nothing is pushed.
    pub async fn refresh_from_source(&self) -> Result<Projection> {
        if !self.is_live() {
            debug!("Refresh requested after teardown; ignoring");
            return Ok(self.projection());
        }

        let started = Instant::now();
        let tree = match time::timeout(self.config.load_timeout, self.store.get_tree()).await {
            Ok(Ok(tree)) => tree,
            Ok(Err(err)) => return Err(self.record_failure(err)),
            Err(_) => return Err(self.record_failure(EngineError::Timeout(self.config.load_timeout))),
        };

        let projection = self.install_tree(&tree);
        info!(
            "Loaded {} bookmarks into {} groups in {}ms",
            self.records().len(),
            projection.len(),
            started.elapsed().as_millis()
        );
        self.publish(&projection);
        Ok(projection)
    }

    fn install_tree(&self, tree: &RawNode) -> Projection {
        let labels = self.lock().labels;
        let records = Flattener::new().with_labels(&labels).flatten(tree);
        let now = current_unix_ms();
        let stats = TreeStats::collect(tree, now);

        let mut state = self.lock();
        state.status = LoadStatus::Loaded {
            records: records.len(),
            at_unix_ms: now,
        };
        state.records = Arc::new(records);
        state.stats = stats;
        state.recompute()
    }

    fn record_failure(&self, err: EngineError) -> EngineError {
        error!("Failed to load bookmarks: {err}");
        self.lock().status = LoadStatus::Failed {
            error: err.to_string(),
            at_unix_ms: current_unix_ms(),
        };
        err
    }

    /// Feed a change notification into the coalescer by hand.
    pub async fn notify_change(&self, kind: ChangeKind) -> Result<()> {
        let coalescer = self.coalescer_slot().clone().ok_or(EngineError::Closed)?;
        coalescer.notify(kind).await
    }

    pub async fn create_bookmark(
        &self,
        parent_id: Option<&str>,
        title: &str,
        url: &str,
    ) -> Result<RawNode> {
        self.store.create(parent_id, title, url).await
    }

    pub async fn update_bookmark(&self, id: &str, changes: BookmarkChanges) -> Result<RawNode> {
        self.store.update(id, changes).await
    }

    pub async fn remove_bookmark(&self, id: &str) -> Result<()> {
        self.store.remove(id).await
    }

    pub async fn search_store(&self, query: &str) -> Result<Vec<RawNode>> {
        self.store.search(query).await
    }

    /// Stop reacting to the store. A refresh already armed becomes a no-op.
    pub fn teardown(&self) {
        if !self.live.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(coalescer) = self.coalescer_slot().take() {
            coalescer.shutdown();
        }
        info!("Projection engine torn down");
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTarget for ProjectionEngine {
    fn is_live(&self) -> bool {
        Self::is_live(self)
    }

    async fn refresh(&self) -> Result<()> {
        self.refresh_from_source().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use pretty_assertions::assert_eq;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(RawNode::folder(
            "0",
            "",
            vec![
                RawNode::folder(
                    "1",
                    "Bookmarks bar",
                    vec![
                        RawNode::bookmark("3", "GitHub", "https://github.com").added_at(20),
                        RawNode::bookmark("4", "", "https://www.rust-lang.org").added_at(10),
                    ],
                ),
                RawNode::folder("2", "Other bookmarks", vec![]),
                RawNode::bookmark("5", "Loose", "https://loose.dev").added_at(30),
            ],
        )))
    }

    fn engine(store: &Arc<MemoryStore>) -> Arc<ProjectionEngine> {
        ProjectionEngine::new(
            Arc::clone(store) as Arc<dyn BookmarkStore>,
            EngineConfig::default().with_language(Language::En),
            ProjectionState::default(),
        )
    }

    fn titles(projection: &Projection) -> Vec<&str> {
        projection.iter().map(|g| g.title.as_str()).collect()
    }

    #[tokio::test]
    async fn starts_idle_and_empty() {
        let engine = engine(&store());
        assert_eq!(engine.status(), LoadStatus::Idle);
        assert!(engine.projection().is_empty());
        assert!(engine.coalescer_health().is_none());
    }

    #[tokio::test]
    async fn refresh_loads_and_pushes() {
        let engine = engine(&store());
        let mut updates = engine.subscribe();
        let projection = engine.refresh_from_source().await.unwrap();
        assert_eq!(titles(&projection), vec!["Other Bookmarks", "Bookmarks bar"]);
        assert!(Arc::ptr_eq(&updates.try_recv().unwrap(), &projection));
        assert!(matches!(engine.status(), LoadStatus::Loaded { records: 3, .. }));
        assert_eq!(engine.stats().total_bookmarks, 3);
        assert_eq!(engine.records()[1].title, "Untitled bookmark");
    }

    #[tokio::test]
    async fn mode_changes_reuse_cached_records() {
        let store = store();
        let engine = engine(&store);
        engine.refresh_from_source().await.unwrap();
        let mut updates = engine.subscribe();

        let by_domain = engine.set_category(Category::Domain);
        assert_eq!(titles(&by_domain), vec!["github.com", "loose.dev", "rust-lang.org"]);
        assert!(updates.try_recv().is_ok());

        let filtered = engine.set_query("rust");
        assert_eq!(titles(&filtered), vec!["rust-lang.org"]);
        assert!(updates.try_recv().is_ok());

        assert_eq!(store.read_count(), 1);
        assert_eq!(engine.state().query, "rust");
    }

    #[tokio::test]
    async fn set_view_does_not_recompute() {
        let engine = engine(&store());
        engine.refresh_from_source().await.unwrap();
        let before = engine.projection();
        let mut updates = engine.subscribe();
        engine.set_view(ViewMode::List);
        assert_eq!(engine.view(), ViewMode::List);
        assert!(Arc::ptr_eq(&before, &engine.projection()));
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn language_switch_relabels_groups() {
        let engine = engine(&store());
        engine.refresh_from_source().await.unwrap();
        let key = engine.projection()[0].key.clone();
        let projection = engine.set_language(Language::Zh);
        assert_eq!(projection[0].title, "其他书签");
        assert_eq!(projection[0].key, key);
        let recent = engine.set_category(Category::Recent);
        assert_eq!(recent[0].title, "最近添加");
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_projection() {
        let store = store();
        let engine = engine(&store);
        let loaded = engine.refresh_from_source().await.unwrap();
        let mut updates = engine.subscribe();

        store.set_available(false);
        let err = engine.refresh_from_source().await.unwrap_err();
        assert!(matches!(err, EngineError::SourceUnavailable(_)));
        assert!(matches!(engine.status(), LoadStatus::Failed { .. }));
        assert!(Arc::ptr_eq(&loaded, &engine.projection()));
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test]
    async fn recent_ignores_category_and_query() {
        let engine = engine(&store());
        engine.refresh_from_source().await.unwrap();
        engine.set_query("github");
        let ids: Vec<String> = engine.recent(2).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["5", "3"]);
    }

    #[tokio::test]
    async fn teardown_is_idempotent_and_disables_refresh() {
        let store = store();
        let engine = engine(&store);
        engine.teardown();
        engine.teardown();
        assert!(!engine.is_live());
        engine.refresh_from_source().await.unwrap();
        assert_eq!(store.read_count(), 0);
        assert!(matches!(
            engine.notify_change(ChangeKind::Changed).await,
            Err(EngineError::Closed)
        ));
    }
}
