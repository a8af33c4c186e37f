//! Crew roster engine.
//!
//! Filter state goes in, a debounced and cancellable stream of paginated
//! queries goes out to a [`RosterStore`], and a selection set is kept across
//! pages. When the store's access-control layer fails, the engine switches
//! to a fixed local dataset for the rest of the session.

pub mod coordinator;
pub mod debounce;
pub mod engine;
pub mod fallback;
pub mod pagination;
pub mod query;
pub mod selection;
pub mod store;

pub use coordinator::{FetchOutcome, RequestCoordinator, RequestToken};
pub use debounce::{DebouncedSearchFeed, SearchDebouncer, SearchInput};
pub use engine::{
    Applied, Completion, DataMode, Dispatch, EngineSettings, FetchKind, NoopObserver,
    PendingFetch, PickerOptions, RosterCondition, RosterEngine, SelectionObserver,
};
pub use fallback::FallbackDataset;
pub use pagination::{PageState, Pagination};
pub use query::{build_query, Field, Predicate, RosterQuery, RowRange, SortKey};
pub use selection::{BulkOutcome, SelectionPolicy, SelectionSet, ToggleOutcome};
pub use store::{classify_backend_message, RosterPage, RosterStore, StoreError, TransientError};
