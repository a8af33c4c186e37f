//! Cross-page crew selection under single/multi-select and capacity policies.

use std::collections::{HashMap, HashSet};

use crate::models::{CrewRecord, SelectionRecord};

/// Cardinality rules for the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub multi_select: bool,
    pub max_selections: Option<usize>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            multi_select: true,
            max_selections: None,
        }
    }
}

/// Result of a single toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    /// Already in the requested state.
    Unchanged,
    /// Rejected without mutation; the selection is at its maximum.
    CapacityExceeded { max: usize },
    /// The id is not in the loaded roster, so there is nothing to select.
    NotVisible,
}

impl ToggleOutcome {
    pub fn mutated(&self) -> bool {
        matches!(self, ToggleOutcome::Selected | ToggleOutcome::Deselected)
    }
}

/// Result of a bulk select/deselect over the visible roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkOutcome {
    /// Ids added or removed.
    pub changed: usize,
    /// Some visible members were left out because the maximum was reached.
    pub capped: bool,
}

/// Selected members keyed by id, independent of which page shows them.
#[derive(Debug, Clone)]
pub struct SelectionSet {
    policy: SelectionPolicy,
    order: Vec<String>,
    records: HashMap<String, SelectionRecord>,
}

impl SelectionSet {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            order: Vec::new(),
            records: HashMap::new(),
        }
    }

    /// Seed from initial ids and whatever records the caller already has.
    ///
    /// Ids without a record get a placeholder until the member shows up in a
    /// loaded roster. When no ids are given the records' ids are used.
    pub fn with_initial(
        policy: SelectionPolicy,
        ids: &[String],
        records: &[SelectionRecord],
    ) -> Self {
        let mut set = Self::new(policy);
        let ids: Vec<&str> = if ids.is_empty() {
            records.iter().map(|r| r.id.as_str()).collect()
        } else {
            ids.iter().map(String::as_str).collect()
        };

        for id in ids {
            if set.records.contains_key(id) {
                continue;
            }
            if set.at_capacity() || (!policy.multi_select && !set.is_empty()) {
                tracing::warn!(id, "initial selection exceeds policy, dropping id");
                continue;
            }
            let record = records
                .iter()
                .find(|r| r.id == id)
                .cloned()
                .unwrap_or_else(|| SelectionRecord::placeholder(id));
            set.insert(record);
        }
        set
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Selected ids in selection order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Every selected record in selection order.
    pub fn records(&self) -> Vec<SelectionRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }

    /// Records of selected members present in `rows`, in roster order.
    pub fn visible_view(&self, rows: &[CrewRecord]) -> Vec<SelectionRecord> {
        rows.iter()
            .filter_map(|row| self.records.get(&row.id).cloned())
            .collect()
    }

    fn at_capacity(&self) -> bool {
        self.policy
            .max_selections
            .is_some_and(|max| self.order.len() >= max)
    }

    fn insert(&mut self, record: SelectionRecord) {
        if !self.records.contains_key(&record.id) {
            self.order.push(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.records.remove(id).is_some() {
            self.order.retain(|existing| existing != id);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
    }

    /// Select `record`, honoring the single-select and capacity rules.
    pub fn select(&mut self, record: &CrewRecord) -> ToggleOutcome {
        if self.contains(&record.id) {
            self.insert(SelectionRecord::from(record));
            return ToggleOutcome::Unchanged;
        }
        if let Some(max) = self.policy.max_selections {
            let room = if self.policy.multi_select {
                self.order.len() < max
            } else {
                max > 0
            };
            if !room {
                return ToggleOutcome::CapacityExceeded { max };
            }
        }
        if !self.policy.multi_select {
            self.clear();
        }
        self.insert(SelectionRecord::from(record));
        ToggleOutcome::Selected
    }

    pub fn deselect(&mut self, id: &str) -> ToggleOutcome {
        if self.remove(id) {
            ToggleOutcome::Deselected
        } else {
            ToggleOutcome::Unchanged
        }
    }

    /// Add visible members in roster order until the maximum is reached.
    ///
    /// With multi-select off the selection collapses to the first visible member.
    pub fn select_all(&mut self, visible: &[CrewRecord]) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        if !self.policy.multi_select {
            if let Some(first) = visible.first() {
                if self.select(first).mutated() {
                    outcome.changed = 1;
                }
            }
            return outcome;
        }

        for record in visible {
            if self.contains(&record.id) {
                continue;
            }
            if self.at_capacity() {
                outcome.capped = true;
                break;
            }
            self.insert(SelectionRecord::from(record));
            outcome.changed += 1;
        }
        outcome
    }

    /// Remove only members that are in `visible`; off-page selections stay.
    pub fn deselect_all(&mut self, visible: &[CrewRecord]) -> BulkOutcome {
        let visible: HashSet<&str> = visible.iter().map(|r| r.id.as_str()).collect();
        let before = self.order.len();
        self.order.retain(|id| !visible.contains(id.as_str()));
        self.records.retain(|id, _| !visible.contains(id.as_str()));
        BulkOutcome {
            changed: before - self.order.len(),
            capped: false,
        }
    }

    /// Refresh stored projections from freshly loaded rows.
    ///
    /// Returns how many records changed.
    pub fn reconcile(&mut self, rows: &[CrewRecord]) -> usize {
        let mut refreshed = 0;
        for row in rows {
            if let Some(existing) = self.records.get_mut(&row.id) {
                let projection = SelectionRecord::from(row);
                if *existing != projection {
                    *existing = projection;
                    refreshed += 1;
                }
            }
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CrewRole, CrewStatus, ValidationStatus};

    fn crew(id: &str) -> CrewRecord {
        CrewRecord {
            id: id.to_string(),
            full_name: format!("Crew {}", id),
            email: None,
            role: CrewRole::Freelancer,
            status: CrewStatus::Active,
            position: "captain".to_string(),
            validation_status: ValidationStatus::Approved,
            preferred_bases: Vec::new(),
            currency: Some("EUR".to_string()),
            years_of_experience: None,
            last_active: None,
            profile_complete: true,
        }
    }

    fn crews(ids: &[&str]) -> Vec<CrewRecord> {
        ids.iter().map(|id| crew(id)).collect()
    }

    fn policy(multi_select: bool, max_selections: Option<usize>) -> SelectionPolicy {
        SelectionPolicy {
            multi_select,
            max_selections,
        }
    }

    #[test]
    fn test_toggle_select_and_deselect() {
        let mut set = SelectionSet::new(SelectionPolicy::default());

        assert_eq!(set.select(&crew("a")), ToggleOutcome::Selected);
        assert_eq!(set.select(&crew("a")), ToggleOutcome::Unchanged);
        assert_eq!(set.deselect("a"), ToggleOutcome::Deselected);
        assert_eq!(set.deselect("a"), ToggleOutcome::Unchanged);
        assert!(set.is_empty());
    }

    #[test]
    fn test_single_select_replaces() {
        let mut set = SelectionSet::new(policy(false, None));
        set.select(&crew("a"));
        set.select(&crew("b"));

        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_capacity_rejects_without_mutation() {
        let mut set = SelectionSet::new(policy(true, Some(2)));
        set.select(&crew("a"));
        set.select(&crew("b"));

        assert_eq!(
            set.select(&crew("c")),
            ToggleOutcome::CapacityExceeded { max: 2 }
        );
        assert_eq!(set.len(), 2);
        assert!(!set.contains("c"));
    }

    #[test]
    fn test_select_all_fills_to_capacity() {
        let mut set = SelectionSet::new(policy(true, Some(3)));
        set.select(&crew("off-page"));

        let outcome = set.select_all(&crews(&["a", "b", "c", "d"]));

        assert_eq!(outcome, BulkOutcome { changed: 2, capped: true });
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["off-page", "a", "b"]);
    }

    #[test]
    fn test_select_all_single_select_collapses_to_first() {
        let mut set = SelectionSet::new(policy(false, None));
        set.select(&crew("z"));

        let outcome = set.select_all(&crews(&["a", "b"]));

        assert_eq!(outcome.changed, 1);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_deselect_all_keeps_off_page() {
        let mut set = SelectionSet::new(SelectionPolicy::default());
        set.select(&crew("off-page"));
        let visible = crews(&["a", "b"]);
        set.select_all(&visible);

        let outcome = set.deselect_all(&visible);

        assert_eq!(outcome.changed, 2);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["off-page"]);
    }

    #[test]
    fn test_visible_view_follows_roster_order() {
        let mut set = SelectionSet::new(SelectionPolicy::default());
        set.select(&crew("c"));
        set.select(&crew("a"));
        set.select(&crew("x"));

        let view = set.visible_view(&crews(&["a", "b", "c"]));
        let ids: Vec<_> = view.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(set.records().len(), 3);
    }

    #[test]
    fn test_initial_ids_hydrate_on_reconcile() {
        let known = SelectionRecord::from(&crew("a"));
        let mut set = SelectionSet::with_initial(
            SelectionPolicy::default(),
            &["a".to_string(), "b".to_string()],
            &[known],
        );

        assert!(!set.records()[0].is_placeholder());
        assert!(set.records()[1].is_placeholder());

        assert_eq!(set.reconcile(&crews(&["b", "q"])), 1);
        assert!(!set.records()[1].is_placeholder());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_initial_selection_respects_policy() {
        let set = SelectionSet::with_initial(
            policy(true, Some(1)),
            &["a".to_string(), "b".to_string()],
            &[],
        );
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_zero_capacity_rejects_single_select() {
        let mut set = SelectionSet::new(policy(false, Some(0)));
        assert_eq!(
            set.select(&crew("a")),
            ToggleOutcome::CapacityExceeded { max: 0 }
        );
    }
}
