//! The roster engine: filters in, paginated and cancellable queries out,
//! with a selection that survives paging and the fallback switchover.
//!
//! The engine never awaits on its own state. Operations that need the store
//! return a [`Dispatch`]; the caller runs the contained [`PendingFetch`]
//! (possibly concurrently with later ones) and hands each [`Completion`] back
//! to [`RosterEngine::complete`]. Only the most recently issued request can
//! change what is on screen.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::coordinator::{self, FetchOutcome, RequestCoordinator, RequestToken};
use super::debounce::{SearchDebouncer, DEFAULT_DEBOUNCE};
use super::fallback::FallbackDataset;
use super::pagination::{PageState, Pagination};
use super::query::{build_query, RosterQuery};
use super::selection::{BulkOutcome, SelectionPolicy, SelectionSet, ToggleOutcome};
use super::store::{RosterPage, RosterStore, StoreError, TransientError};
use crate::models::{CrewRecord, FilterChange, FilterState, SelectionRecord};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed engine tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub page_size: usize,
    pub request_timeout: Duration,
    pub search_debounce: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            search_debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Per-picker construction inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOptions {
    pub selected_crew_ids: Vec<String>,
    pub selected_crew: Vec<SelectionRecord>,
    /// Pins the position filter; position changes are ignored while set.
    pub required_position: Option<String>,
    pub max_selections: Option<usize>,
    pub multi_select: bool,
}

impl Default for PickerOptions {
    fn default() -> Self {
        Self {
            selected_crew_ids: Vec::new(),
            selected_crew: Vec::new(),
            required_position: None,
            max_selections: None,
            multi_select: true,
        }
    }
}

impl PickerOptions {
    fn policy(&self) -> SelectionPolicy {
        SelectionPolicy {
            multi_select: self.multi_select,
            max_selections: self.max_selections,
        }
    }
}

/// Receives selection change notifications.
pub trait SelectionObserver: Send {
    /// Called after every selection mutation with the visible-derived view.
    fn selection_changed(&mut self, visible: &[SelectionRecord]);

    /// Called on explicit confirmation with the full selection.
    fn selection_confirmed(&mut self, selection: &[SelectionRecord]);
}

/// Observer that ignores every notification.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SelectionObserver for NoopObserver {
    fn selection_changed(&mut self, _visible: &[SelectionRecord]) {}
    fn selection_confirmed(&mut self, _selection: &[SelectionRecord]) {}
}

/// Where roster rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Live,
    /// Illustrative rows from the fixed dataset; not authoritative.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    FirstPage,
    NextPage,
}

/// A query ready to run against the store.
pub struct PendingFetch {
    token: RequestToken,
    kind: FetchKind,
    query: RosterQuery,
    store: Arc<dyn RosterStore>,
    timeout: Duration,
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingFetch")
            .field("token", &self.token)
            .field("kind", &self.kind)
            .field("query", &self.query)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PendingFetch {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn kind(&self) -> FetchKind {
        self.kind
    }

    pub fn query(&self) -> &RosterQuery {
        &self.query
    }

    /// Execute against the store under the request timeout.
    pub async fn run(self) -> Completion {
        let result = coordinator::execute(self.store.as_ref(), &self.query, self.timeout).await;
        self.complete_with(result)
    }

    /// Pair this fetch with a result obtained elsewhere.
    pub fn complete_with(self, result: Result<RosterPage, StoreError>) -> Completion {
        Completion {
            token: self.token,
            kind: self.kind,
            result,
        }
    }
}

/// A finished fetch waiting to be applied.
#[derive(Debug, Clone)]
pub struct Completion {
    pub token: RequestToken,
    pub kind: FetchKind,
    pub result: Result<RosterPage, StoreError>,
}

/// What an engine operation asks the caller to do next.
#[derive(Debug)]
pub enum Dispatch {
    /// No position chosen; nothing was issued.
    PositionRequired,
    /// Rows were produced locally from the fallback dataset.
    Local,
    /// Nothing to do.
    Idle,
    Remote(PendingFetch),
}

impl Dispatch {
    pub fn into_fetch(self) -> Option<PendingFetch> {
        match self {
            Dispatch::Remote(fetch) => Some(fetch),
            _ => None,
        }
    }
}

/// Effect of applying a completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Rows { kind: FetchKind, received: usize },
    /// Superseded or cancelled; state untouched.
    Discarded,
    FallbackActivated,
    Failed(TransientError),
}

/// What the roster area should show.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterCondition {
    PositionRequired,
    Loading,
    Failed(TransientError),
    Ready,
}

pub struct RosterEngine {
    store: Arc<dyn RosterStore>,
    settings: EngineSettings,
    options: PickerOptions,
    filters: FilterState,
    debouncer: SearchDebouncer,
    coordinator: RequestCoordinator,
    pagination: Pagination,
    selection: SelectionSet,
    mode: DataMode,
    fallback: FallbackDataset,
    last_error: Option<TransientError>,
    failed_fetch: Option<FetchKind>,
    /// Outstanding retest issued from fallback mode.
    probe: Option<RequestToken>,
    observer: Box<dyn SelectionObserver>,
}

impl RosterEngine {
    pub fn new(store: Arc<dyn RosterStore>, settings: EngineSettings, options: PickerOptions) -> Self {
        let selection = SelectionSet::with_initial(
            options.policy(),
            &options.selected_crew_ids,
            &options.selected_crew,
        );

        Self {
            store,
            settings,
            filters: initial_filters(&options),
            debouncer: SearchDebouncer::new(settings.search_debounce),
            coordinator: RequestCoordinator::new(settings.request_timeout),
            pagination: Pagination::new(settings.page_size),
            selection,
            mode: DataMode::Live,
            fallback: FallbackDataset::builtin(),
            last_error: None,
            failed_fetch: None,
            probe: None,
            observer: Box::new(NoopObserver),
            options,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn SelectionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_fallback(mut self, dataset: FallbackDataset) -> Self {
        self.fallback = dataset;
        self
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn page_state(&self) -> PageState {
        self.pagination.state()
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn rows(&self) -> &[CrewRecord] {
        self.pagination.rows()
    }

    pub fn has_more(&self) -> bool {
        self.pagination.has_more()
    }

    pub fn last_error(&self) -> Option<&TransientError> {
        self.last_error.as_ref()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn condition(&self) -> RosterCondition {
        if !self.filters.has_position() {
            RosterCondition::PositionRequired
        } else if let Some(err) = &self.last_error {
            RosterCondition::Failed(err.clone())
        } else if self.pagination.state() == PageState::LoadingFirstPage {
            RosterCondition::Loading
        } else {
            RosterCondition::Ready
        }
    }

    // ==================== FILTERS ====================

    /// Apply a non-search filter edit; a real change restarts from page 0.
    pub fn change_filter(&mut self, change: FilterChange) -> Dispatch {
        if matches!(change, FilterChange::Position(_)) && self.options.required_position.is_some() {
            tracing::debug!("position is pinned, ignoring change");
            return Dispatch::Idle;
        }
        if !self.filters.apply(change) {
            return Dispatch::Idle;
        }
        self.refresh()
    }

    /// Record a search keystroke. Nothing is queried until the window elapses.
    pub fn type_search(&mut self, text: &str, now: Instant) {
        self.debouncer.input(text, now);
    }

    /// When the pending search term will commit, if one is pending.
    pub fn search_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Commit the pending search term if its quiet window has elapsed.
    pub fn poll_search(&mut self, now: Instant) -> Dispatch {
        match self.debouncer.poll(now) {
            Some(term) => self.commit_search(term),
            None => Dispatch::Idle,
        }
    }

    /// Commit an already debounced search term.
    pub fn commit_search(&mut self, term: String) -> Dispatch {
        if self.filters.search.trim() == term.trim() {
            return Dispatch::Idle;
        }
        tracing::debug!(search = %term, "search committed");
        self.filters.search = term;
        self.refresh()
    }

    // ==================== QUERIES ====================

    /// Reset paging and load the first page for the current filters.
    pub fn refresh(&mut self) -> Dispatch {
        self.last_error = None;
        self.failed_fetch = None;
        self.probe = None;

        if !self.filters.has_position() {
            self.coordinator.cancel();
            self.pagination.reset();
            return Dispatch::PositionRequired;
        }

        if self.mode == DataMode::Fallback {
            self.coordinator.cancel();
            self.show_fallback();
            return Dispatch::Local;
        }

        let token = self.coordinator.issue();
        self.pagination.begin_first_page();
        let query = build_query(&self.filters, 0, self.pagination.page_size());
        tracing::debug!(token = token.id(), "issuing first roster page");
        Dispatch::Remote(self.pending(token, FetchKind::FirstPage, query))
    }

    /// Request the next page. A no-op while loading or once exhausted.
    pub fn load_more(&mut self) -> Dispatch {
        if !self.filters.has_position() {
            return Dispatch::PositionRequired;
        }
        if self.mode == DataMode::Fallback {
            return Dispatch::Idle;
        }
        let Some(offset) = self.pagination.begin_load_more() else {
            return Dispatch::Idle;
        };

        self.last_error = None;
        self.failed_fetch = None;
        let token = self.coordinator.issue();
        let query = build_query(&self.filters, offset, self.pagination.page_size());
        tracing::debug!(token = token.id(), offset, "issuing next roster page");
        Dispatch::Remote(self.pending(token, FetchKind::NextPage, query))
    }

    /// Re-issue the query that last failed transiently.
    pub fn retry(&mut self) -> Dispatch {
        match self.failed_fetch {
            Some(FetchKind::FirstPage) => self.refresh(),
            Some(FetchKind::NextPage) => self.load_more(),
            None => Dispatch::Idle,
        }
    }

    /// Probe the remote store again from fallback mode.
    ///
    /// The fallback rows stay on screen until the probe answers. Live mode
    /// resumes only on a successful first page.
    pub fn retest_remote(&mut self) -> Dispatch {
        if self.mode == DataMode::Live {
            return self.refresh();
        }
        if !self.filters.has_position() {
            return Dispatch::PositionRequired;
        }

        tracing::info!("retesting remote roster store");
        let token = self.coordinator.issue();
        self.probe = Some(token);
        let query = build_query(&self.filters, 0, self.pagination.page_size());
        Dispatch::Remote(self.pending(token, FetchKind::FirstPage, query))
    }

    fn pending(&self, token: RequestToken, kind: FetchKind, query: RosterQuery) -> PendingFetch {
        PendingFetch {
            token,
            kind,
            query,
            store: Arc::clone(&self.store),
            timeout: self.coordinator.timeout(),
        }
    }

    /// Apply a finished fetch.
    pub fn complete(&mut self, completion: Completion) -> Applied {
        let Completion {
            token,
            kind,
            result,
        } = completion;

        let probing = self.probe == Some(token);
        if probing {
            self.probe = None;
        }

        match self.coordinator.settle(token, result) {
            FetchOutcome::Stale => Applied::Discarded,
            FetchOutcome::Success(page) => {
                if probing {
                    tracing::info!("remote roster store reachable, leaving fallback data");
                    self.mode = DataMode::Live;
                }
                let received = page.rows.len();
                match kind {
                    FetchKind::FirstPage => {
                        self.pagination.first_page_loaded(page.rows, page.total_count)
                    }
                    FetchKind::NextPage => {
                        self.pagination.page_appended(page.rows, page.total_count)
                    }
                }
                self.reconcile_selection();
                Applied::Rows { kind, received }
            }
            FetchOutcome::AccessControl(message) => {
                tracing::warn!(%message, "roster access control failed, switching to fallback data");
                self.mode = DataMode::Fallback;
                self.show_fallback();
                Applied::FallbackActivated
            }
            FetchOutcome::Transient(err) if probing => {
                tracing::warn!(error = %err, "retest failed, keeping fallback data");
                Applied::Failed(err)
            }
            FetchOutcome::Transient(err) => {
                tracing::warn!(error = %err, "roster query failed");
                self.pagination.load_failed();
                self.last_error = Some(err.clone());
                self.failed_fetch = Some(kind);
                Applied::Failed(err)
            }
        }
    }

    /// Run a dispatch to completion against the store.
    pub async fn execute(&mut self, dispatch: Dispatch) -> Option<Applied> {
        let fetch = dispatch.into_fetch()?;
        let completion = fetch.run().await;
        Some(self.complete(completion))
    }

    fn show_fallback(&mut self) {
        let rows = self.fallback.filter(&self.filters);
        self.pagination.show_all(rows);
        self.reconcile_selection();
    }

    // ==================== SELECTION ====================

    pub fn toggle(&mut self, id: &str, selected: bool) -> ToggleOutcome {
        let outcome = if selected {
            match self.pagination.rows().iter().find(|r| r.id == id) {
                Some(record) => self.selection.select(record),
                None => ToggleOutcome::NotVisible,
            }
        } else {
            self.selection.deselect(id)
        };

        if let ToggleOutcome::CapacityExceeded { max } = outcome {
            tracing::debug!(id, max, "selection at capacity");
        }
        if outcome.mutated() {
            self.notify_changed();
        }
        outcome
    }

    /// Select or deselect everything currently visible.
    pub fn select_all_visible(&mut self, selected: bool) -> BulkOutcome {
        let outcome = if selected {
            self.selection.select_all(self.pagination.rows())
        } else {
            self.selection.deselect_all(self.pagination.rows())
        };
        if outcome.changed > 0 {
            self.notify_changed();
        }
        outcome
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.ids().map(str::to_string).collect()
    }

    pub fn selection_records(&self) -> Vec<SelectionRecord> {
        self.selection.records()
    }

    /// Selected members that are in the loaded roster.
    pub fn visible_selection(&self) -> Vec<SelectionRecord> {
        self.selection.visible_view(self.pagination.rows())
    }

    /// Emit the full selection to the observer and return it.
    pub fn confirm(&mut self) -> Vec<SelectionRecord> {
        let selection = self.selection.records();
        self.observer.selection_confirmed(&selection);
        selection
    }

    fn reconcile_selection(&mut self) {
        if self.selection.reconcile(self.pagination.rows()) > 0 {
            self.notify_changed();
        }
    }

    fn notify_changed(&mut self) {
        let visible = self.selection.visible_view(self.pagination.rows());
        self.observer.selection_changed(&visible);
    }

    // ==================== LIFECYCLE ====================

    /// Clear filters, roster and selection. Fallback mode is kept.
    pub fn reset(&mut self) -> Dispatch {
        tracing::info!("resetting roster engine");
        self.coordinator.cancel();
        self.debouncer.clear();
        self.filters = initial_filters(&self.options);
        self.pagination.reset();
        if !self.selection.is_empty() {
            self.selection.clear();
            self.notify_changed();
        }
        self.refresh()
    }

    /// Adopt new construction inputs.
    ///
    /// The selection is replaced only when the initial ids differ from the
    /// current selection; otherwise current members are kept under the new
    /// policy, which may drop some. Observers hear about it once.
    pub fn reinitialize(&mut self, options: PickerOptions) -> Dispatch {
        let before = self.selected_ids();
        let mut current: Vec<&str> = self.selection.ids().collect();
        let mut incoming: Vec<&str> = options.selected_crew_ids.iter().map(String::as_str).collect();
        current.sort_unstable();
        incoming.sort_unstable();
        let ids_changed = current != incoming;

        self.selection = if ids_changed {
            SelectionSet::with_initial(
                options.policy(),
                &options.selected_crew_ids,
                &options.selected_crew,
            )
        } else {
            let ids = self.selected_ids();
            SelectionSet::with_initial(options.policy(), &ids, &self.selection.records())
        };

        let position_changed = options.required_position != self.options.required_position;
        if let Some(position) = &options.required_position {
            self.filters.position = Some(position.clone());
        }
        self.options = options;

        let hydrated = self.selection.reconcile(self.pagination.rows()) > 0;
        if hydrated || self.selected_ids() != before {
            self.notify_changed();
        }
        if position_changed {
            self.refresh()
        } else {
            Dispatch::Idle
        }
    }
}

fn initial_filters(options: &PickerOptions) -> FilterState {
    FilterState {
        position: options.required_position.clone(),
        ..FilterState::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::models::{CrewRole, CrewStatus, ValidationStatus};
    use crate::roster::query::Predicate;

    /// In-memory store that can be told to fail and counts calls.
    struct ScriptedStore {
        records: Vec<CrewRecord>,
        failure: Mutex<Option<StoreError>>,
        calls: AtomicUsize,
    }

    impl ScriptedStore {
        fn new(records: Vec<CrewRecord>) -> Arc<Self> {
            Arc::new(Self {
                records,
                failure: Mutex::new(None),
                calls: AtomicUsize::new(0),
            })
        }

        fn fail_with(&self, err: Option<StoreError>) {
            *self.failure.lock().unwrap() = err;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RosterStore for ScriptedStore {
        async fn query_roster(&self, query: &RosterQuery) -> Result<RosterPage, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let failure = self.failure.lock().unwrap().clone();
            if let Some(err) = failure {
                return Err(err);
            }
            let (rows, total) = query.evaluate(&self.records);
            Ok(RosterPage {
                rows,
                total_count: Some(total as u64),
            })
        }
    }

    #[derive(Default)]
    struct Recorded {
        changed: Vec<Vec<String>>,
        confirmed: Vec<Vec<String>>,
    }

    struct RecordingObserver(Arc<Mutex<Recorded>>);

    impl SelectionObserver for RecordingObserver {
        fn selection_changed(&mut self, visible: &[SelectionRecord]) {
            let ids = visible.iter().map(|r| r.id.clone()).collect();
            self.0.lock().unwrap().changed.push(ids);
        }

        fn selection_confirmed(&mut self, selection: &[SelectionRecord]) {
            let ids = selection.iter().map(|r| r.id.clone()).collect();
            self.0.lock().unwrap().confirmed.push(ids);
        }
    }

    fn crew(id: &str, name: &str, position: &str) -> CrewRecord {
        CrewRecord {
            id: id.to_string(),
            full_name: name.to_string(),
            email: Some(format!("{}@crew.example", id)),
            role: CrewRole::Internal,
            status: CrewStatus::Active,
            position: position.to_string(),
            validation_status: ValidationStatus::Approved,
            preferred_bases: vec!["LIS".to_string()],
            currency: Some("EUR".to_string()),
            years_of_experience: Some(10),
            last_active: None,
            profile_complete: true,
        }
    }

    /// 25 active approved captains plus a few others.
    fn fleet() -> Vec<CrewRecord> {
        let mut records: Vec<CrewRecord> = (1..=25)
            .map(|i| crew(&format!("cpt-{:02}", i), &format!("Captain {:02}", i), "captain"))
            .collect();
        records.push(crew("fo-01", "Officer Ana", "first_officer"));
        records.push(crew("fo-02", "Officer Rui", "first_officer"));
        records.push(crew("cc-01", "Cabin Sara", "cabin_crew"));
        records
    }

    fn engine_with(store: Arc<ScriptedStore>, options: PickerOptions) -> RosterEngine {
        RosterEngine::new(store, EngineSettings::default(), options)
    }

    fn captains() -> FilterChange {
        FilterChange::Position(Some("captain".to_string()))
    }

    #[tokio::test]
    async fn test_no_query_without_position() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store.clone(), PickerOptions::default());

        assert!(matches!(engine.refresh(), Dispatch::PositionRequired));
        assert!(matches!(engine.load_more(), Dispatch::PositionRequired));
        assert_eq!(engine.condition(), RosterCondition::PositionRequired);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_captain_scenario_pages_to_exhaustion() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store.clone(), PickerOptions::default());

        engine.change_filter(FilterChange::Roles(
            [CrewRole::Internal, CrewRole::Freelancer].into_iter().collect(),
        ));
        engine.change_filter(FilterChange::Status(Some(CrewStatus::Active)));
        let dispatch = engine.change_filter(FilterChange::ValidationStatus(Some(
            ValidationStatus::Approved,
        )));
        assert!(matches!(dispatch, Dispatch::PositionRequired));

        let dispatch = engine.change_filter(captains());
        let applied = engine.execute(dispatch).await;
        assert_eq!(
            applied,
            Some(Applied::Rows {
                kind: FetchKind::FirstPage,
                received: 20
            })
        );
        assert!(engine.has_more());
        assert_eq!(engine.pagination().total_hint(), Some(25));

        let fetch = engine.load_more().into_fetch().unwrap();
        assert_eq!(fetch.query().range.from, 20);
        assert_eq!(fetch.query().range.to, 39);
        let applied = engine.complete(fetch.run().await);
        assert_eq!(
            applied,
            Applied::Rows {
                kind: FetchKind::NextPage,
                received: 5
            }
        );

        assert!(!engine.has_more());
        assert_eq!(engine.page_state(), PageState::Exhausted);
        let mut ids: Vec<_> = engine.rows().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 25);
        ids.dedup();
        assert_eq!(ids.len(), 25);

        let calls = store.calls();
        assert!(matches!(engine.load_more(), Dispatch::Idle));
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test]
    async fn test_last_issued_wins_regardless_of_arrival() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default());

        let first = engine.change_filter(captains()).into_fetch().unwrap();
        let second = engine
            .change_filter(FilterChange::Position(Some("first_officer".to_string())))
            .into_fetch()
            .unwrap();

        let second_done = second.run().await;
        let first_done = first.run().await;

        assert!(matches!(engine.complete(second_done), Applied::Rows { .. }));
        assert_eq!(engine.complete(first_done), Applied::Discarded);

        assert_eq!(engine.rows().len(), 2);
        assert!(engine.rows().iter().all(|r| r.position == "first_officer"));
    }

    #[tokio::test]
    async fn test_stale_response_arriving_first_is_ignored() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default());

        let first = engine.change_filter(captains()).into_fetch().unwrap();
        let second = engine
            .change_filter(FilterChange::Position(Some("cabin_crew".to_string())))
            .into_fetch()
            .unwrap();

        let first_done = first.run().await;
        assert_eq!(engine.complete(first_done), Applied::Discarded);
        assert_eq!(engine.page_state(), PageState::LoadingFirstPage);
        assert!(engine.rows().is_empty());

        engine.complete(second.run().await);
        assert_eq!(engine.rows().len(), 1);
        assert_eq!(engine.rows()[0].id, "cc-01");
    }

    #[tokio::test]
    async fn test_superseded_failure_is_silent() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default());

        let first = engine.change_filter(captains()).into_fetch().unwrap();
        let second = engine
            .change_filter(FilterChange::Status(Some(CrewStatus::Active)))
            .into_fetch()
            .unwrap();

        let failed = first.complete_with(Err(StoreError::AccessControl("policy".into())));
        assert_eq!(engine.complete(failed), Applied::Discarded);
        assert_eq!(engine.mode(), DataMode::Live);

        engine.complete(second.run().await);
        assert_eq!(engine.rows().len(), 20);
    }

    #[tokio::test]
    async fn test_access_control_failure_is_sticky() {
        let store = ScriptedStore::new(fleet());
        store.fail_with(Some(StoreError::AccessControl(
            "infinite recursion detected in policy".to_string(),
        )));
        let mut engine = engine_with(store.clone(), PickerOptions::default());

        let dispatch = engine.change_filter(captains());
        assert_eq!(
            engine.execute(dispatch).await,
            Some(Applied::FallbackActivated)
        );
        assert_eq!(engine.mode(), DataMode::Fallback);
        assert!(!engine.has_more());
        let expected = FallbackDataset::builtin().filter(engine.filters());
        assert_eq!(engine.rows(), expected.as_slice());

        let calls = store.calls();
        let dispatch = engine.change_filter(FilterChange::Status(Some(CrewStatus::Active)));
        assert!(matches!(dispatch, Dispatch::Local));
        assert!(matches!(engine.load_more(), Dispatch::Idle));
        assert_eq!(store.calls(), calls);
        assert!(engine
            .rows()
            .iter()
            .all(|r| r.position == "captain" && r.status == CrewStatus::Active));
    }

    #[tokio::test]
    async fn test_fallback_matches_live_semantics_on_same_data() {
        let data = FallbackDataset::builtin();
        let live_store = ScriptedStore::new(data.records().to_vec());
        let mut live = engine_with(live_store, PickerOptions::default());
        let dispatch = live.change_filter(captains());
        live.execute(dispatch).await;

        let failing = ScriptedStore::new(Vec::new());
        failing.fail_with(Some(StoreError::AccessControl("permission denied".into())));
        let mut degraded = engine_with(failing, PickerOptions::default());
        let dispatch = degraded.change_filter(captains());
        degraded.execute(dispatch).await;

        assert_eq!(degraded.mode(), DataMode::Fallback);
        assert_eq!(live.rows(), degraded.rows());
    }

    #[tokio::test]
    async fn test_retest_remote_probes_again() {
        let store = ScriptedStore::new(fleet());
        store.fail_with(Some(StoreError::AccessControl("policy".into())));
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        assert_eq!(engine.mode(), DataMode::Fallback);

        store.fail_with(None);
        let dispatch = engine.retest_remote();
        assert!(matches!(dispatch, Dispatch::Remote(_)));
        engine.execute(dispatch).await;

        assert_eq!(engine.mode(), DataMode::Live);
        assert_eq!(engine.rows().len(), 20);
    }

    #[tokio::test]
    async fn test_failed_retest_stays_in_fallback() {
        let store = ScriptedStore::new(fleet());
        store.fail_with(Some(StoreError::AccessControl("policy".into())));
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        let fallback_rows = engine.rows().to_vec();
        assert!(!fallback_rows.is_empty());

        store.fail_with(Some(StoreError::Transient(TransientError::Network(
            "connection refused".into(),
        ))));
        let fetch = engine.retest_remote().into_fetch().unwrap();
        // Still illustrative while the retest is in flight.
        assert_eq!(engine.mode(), DataMode::Fallback);
        assert_eq!(engine.rows(), fallback_rows.as_slice());

        let applied = engine.complete(fetch.run().await);
        assert!(matches!(applied, Applied::Failed(TransientError::Network(_))));
        assert_eq!(engine.mode(), DataMode::Fallback);
        assert_eq!(engine.rows(), fallback_rows.as_slice());
        assert_eq!(engine.condition(), RosterCondition::Ready);

        let calls = store.calls();
        let dispatch = engine.change_filter(FilterChange::Status(Some(CrewStatus::Active)));
        assert!(matches!(dispatch, Dispatch::Local));
        assert_eq!(store.calls(), calls);
    }

    #[tokio::test]
    async fn test_filter_change_cancels_retest() {
        let store = ScriptedStore::new(fleet());
        store.fail_with(Some(StoreError::AccessControl("policy".into())));
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        store.fail_with(None);
        let fetch = engine.retest_remote().into_fetch().unwrap();
        engine.change_filter(FilterChange::Status(Some(CrewStatus::Active)));

        assert_eq!(engine.complete(fetch.run().await), Applied::Discarded);
        assert_eq!(engine.mode(), DataMode::Fallback);
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_rows_and_retries() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        store.fail_with(Some(StoreError::Transient(TransientError::Network(
            "connection reset".into(),
        ))));
        let dispatch = engine.load_more();
        let applied = engine.execute(dispatch).await;
        assert!(matches!(applied, Some(Applied::Failed(_))));
        assert_eq!(engine.rows().len(), 20);
        assert_eq!(engine.page_state(), PageState::HasData);
        assert!(matches!(engine.condition(), RosterCondition::Failed(_)));

        // Repeated transient failures never switch to fallback data.
        let dispatch = engine.retry();
        engine.execute(dispatch).await;
        assert_eq!(engine.mode(), DataMode::Live);

        store.fail_with(None);
        let fetch = engine.retry().into_fetch().unwrap();
        assert_eq!(fetch.kind(), FetchKind::NextPage);
        assert_eq!(fetch.query().range.from, 20);
        engine.complete(fetch.run().await);

        assert_eq!(engine.rows().len(), 25);
        assert_eq!(engine.condition(), RosterCondition::Ready);
        assert!(engine.last_error().is_none());
    }

    #[tokio::test]
    async fn test_failed_first_page_can_be_retried() {
        let store = ScriptedStore::new(fleet());
        store.fail_with(Some(StoreError::Transient(TransientError::Timeout(
            Duration::from_secs(10),
        ))));
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        assert_eq!(engine.page_state(), PageState::Empty);

        store.fail_with(None);
        let dispatch = engine.retry();
        let fetch = dispatch.into_fetch().unwrap();
        assert_eq!(fetch.kind(), FetchKind::FirstPage);
        engine.complete(fetch.run().await);
        assert_eq!(engine.rows().len(), 20);
    }

    #[tokio::test]
    async fn test_selection_persists_across_pages() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        assert_eq!(engine.toggle("cpt-03", true), ToggleOutcome::Selected);

        let dispatch = engine.load_more();
        engine.execute(dispatch).await;
        assert!(engine.selected_ids().contains(&"cpt-03".to_string()));

        // A filter change drops the page holding the member but keeps the selection.
        let dispatch = engine.change_filter(FilterChange::Position(Some("first_officer".into())));
        engine.execute(dispatch).await;
        assert_eq!(engine.selected_ids(), vec!["cpt-03".to_string()]);
        assert!(engine.visible_selection().is_empty());
        assert_eq!(engine.selection_records()[0].full_name, "Captain 03");
    }

    #[tokio::test]
    async fn test_capacity_exceeded_is_signalled() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let store = ScriptedStore::new(fleet());
        let options = PickerOptions {
            max_selections: Some(2),
            ..PickerOptions::default()
        };
        let mut engine = engine_with(store, options)
            .with_observer(Box::new(RecordingObserver(recorded.clone())));
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        engine.toggle("cpt-01", true);
        engine.toggle("cpt-02", true);
        assert_eq!(
            engine.toggle("cpt-03", true),
            ToggleOutcome::CapacityExceeded { max: 2 }
        );

        assert_eq!(engine.selected_ids().len(), 2);
        assert_eq!(recorded.lock().unwrap().changed.len(), 2);
    }

    #[tokio::test]
    async fn test_select_all_visible_partial_fill() {
        let store = ScriptedStore::new(fleet());
        let options = PickerOptions {
            max_selections: Some(5),
            ..PickerOptions::default()
        };
        let mut engine = engine_with(store, options);
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        let outcome = engine.select_all_visible(true);
        assert_eq!(outcome, BulkOutcome { changed: 5, capped: true });

        let outcome = engine.select_all_visible(false);
        assert_eq!(outcome.changed, 5);
        assert!(engine.selected_ids().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_not_visible() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        assert_eq!(engine.toggle("fo-01", true), ToggleOutcome::NotVisible);
        assert!(engine.selected_ids().is_empty());
    }

    #[tokio::test]
    async fn test_selection_survives_fallback_switch() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        engine.toggle("cpt-07", true);

        store.fail_with(Some(StoreError::AccessControl("policy".into())));
        let dispatch = engine.change_filter(FilterChange::Status(Some(CrewStatus::Active)));
        engine.execute(dispatch).await;

        assert_eq!(engine.mode(), DataMode::Fallback);
        assert_eq!(engine.selected_ids(), vec!["cpt-07".to_string()]);
    }

    #[tokio::test]
    async fn test_debounced_search_issues_one_query() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        let start = Instant::now();
        for (i, text) in ["C", "Ca", "Captain 1"].iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            engine.type_search(text, at);
            assert!(matches!(engine.poll_search(at), Dispatch::Idle));
        }
        // Typing alone does not touch the loaded roster.
        assert_eq!(engine.rows().len(), 20);

        let deadline = engine.search_deadline().unwrap();
        let fetch = engine.poll_search(deadline).into_fetch().unwrap();
        assert!(fetch.query().predicates.contains(&Predicate::Search {
            fields: crate::roster::query::SEARCH_FIELDS.to_vec(),
            needle: "Captain 1".to_string(),
        }));
        assert!(matches!(engine.poll_search(deadline), Dispatch::Idle));

        engine.complete(fetch.run().await);
        // Captain 10 through Captain 19
        assert_eq!(engine.rows().len(), 10);
        assert_eq!(engine.filters().search, "Captain 1");
    }

    #[tokio::test]
    async fn test_padded_search_term_is_not_recommitted() {
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store.clone(), PickerOptions::default());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        let dispatch = engine.commit_search("Captain 1".to_string());
        engine.execute(dispatch).await;
        assert_eq!(engine.rows().len(), 10);

        let calls = store.calls();
        assert!(matches!(
            engine.commit_search("Captain 1 ".to_string()),
            Dispatch::Idle
        ));
        assert_eq!(store.calls(), calls);
        assert_eq!(engine.rows().len(), 10);
    }

    #[tokio::test]
    async fn test_required_position_is_pinned() {
        let store = ScriptedStore::new(fleet());
        let options = PickerOptions {
            required_position: Some("first_officer".to_string()),
            ..PickerOptions::default()
        };
        let mut engine = engine_with(store, options);

        let dispatch = engine.refresh();
        engine.execute(dispatch).await;
        assert_eq!(engine.rows().len(), 2);

        assert!(matches!(engine.change_filter(captains()), Dispatch::Idle));
        assert_eq!(engine.filters().position.as_deref(), Some("first_officer"));
    }

    #[tokio::test]
    async fn test_reset_clears_selection_and_filters() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default())
            .with_observer(Box::new(RecordingObserver(recorded.clone())));
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        engine.toggle("cpt-01", true);

        assert!(matches!(engine.reset(), Dispatch::PositionRequired));
        assert!(engine.selected_ids().is_empty());
        assert!(engine.rows().is_empty());
        assert_eq!(engine.filters(), &FilterState::default());
        assert_eq!(recorded.lock().unwrap().changed.last(), Some(&Vec::new()));
    }

    #[tokio::test]
    async fn test_initial_selection_and_reinitialize() {
        let store = ScriptedStore::new(fleet());
        let options = PickerOptions {
            selected_crew_ids: vec!["cpt-02".to_string(), "fo-01".to_string()],
            ..PickerOptions::default()
        };
        let mut engine = engine_with(store, options.clone());
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;

        let records = engine.selection_records();
        assert_eq!(records[0].full_name, "Captain 02");
        assert!(records[1].is_placeholder());

        // Same ids: selection kept.
        engine.reinitialize(options);
        assert_eq!(engine.selected_ids().len(), 2);

        engine.reinitialize(PickerOptions {
            selected_crew_ids: vec!["cpt-05".to_string()],
            ..PickerOptions::default()
        });
        assert_eq!(engine.selected_ids(), vec!["cpt-05".to_string()]);
        assert_eq!(engine.selection_records()[0].full_name, "Captain 05");
    }

    #[tokio::test]
    async fn test_confirm_emits_full_selection() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default())
            .with_observer(Box::new(RecordingObserver(recorded.clone())));
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        engine.toggle("cpt-01", true);

        let dispatch = engine.change_filter(FilterChange::Position(Some("cabin_crew".into())));
        engine.execute(dispatch).await;
        engine.toggle("cc-01", true);

        let confirmed = engine.confirm();
        assert_eq!(confirmed.len(), 2);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.confirmed, vec![vec!["cpt-01".to_string(), "cc-01".to_string()]]);
        // The change notification only carries what is on screen.
        assert_eq!(recorded.changed.last(), Some(&vec!["cc-01".to_string()]));
    }

    #[tokio::test]
    async fn test_reinitialize_under_tighter_policy_notifies_once() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let store = ScriptedStore::new(fleet());
        let mut engine = engine_with(store, PickerOptions::default())
            .with_observer(Box::new(RecordingObserver(recorded.clone())));
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        for id in ["cpt-01", "cpt-02", "cpt-03"] {
            engine.toggle(id, true);
        }
        let before = recorded.lock().unwrap().changed.len();

        engine.reinitialize(PickerOptions {
            selected_crew_ids: vec!["cpt-01".into(), "cpt-02".into(), "cpt-03".into()],
            max_selections: Some(1),
            ..PickerOptions::default()
        });

        assert_eq!(engine.selected_ids(), vec!["cpt-01".to_string()]);
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.changed.len(), before + 1);
        assert_eq!(recorded.changed.last(), Some(&vec!["cpt-01".to_string()]));
    }

    #[tokio::test]
    async fn test_reinitialize_with_new_ids_notifies_once() {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let store = ScriptedStore::new(fleet());
        let options = PickerOptions {
            selected_crew_ids: vec!["cpt-02".to_string()],
            ..PickerOptions::default()
        };
        let mut engine = engine_with(store, options)
            .with_observer(Box::new(RecordingObserver(recorded.clone())));
        let dispatch = engine.change_filter(captains());
        engine.execute(dispatch).await;
        let before = recorded.lock().unwrap().changed.len();

        // cpt-05 starts as a placeholder and is hydrated from the loaded page.
        engine.reinitialize(PickerOptions {
            selected_crew_ids: vec!["cpt-05".to_string()],
            ..PickerOptions::default()
        });
        assert_eq!(engine.selection_records()[0].full_name, "Captain 05");
        assert_eq!(recorded.lock().unwrap().changed.len(), before + 1);

        // Same ids under the same policy: nothing to report.
        engine.reinitialize(PickerOptions {
            selected_crew_ids: vec!["cpt-05".to_string()],
            ..PickerOptions::default()
        });
        assert_eq!(recorded.lock().unwrap().changed.len(), before + 1);
    }
}
