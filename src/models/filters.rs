//! Filter state driving roster queries.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{CrewRole, CrewStatus, ValidationStatus};

/// Sortable roster columns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    FullName,
    Position,
    Status,
    ValidationStatus,
    YearsOfExperience,
    LastActive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// The user-chosen query parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    /// No query runs until this is set.
    pub position: Option<String>,
    pub roles: BTreeSet<CrewRole>,
    pub status: Option<CrewStatus>,
    pub validation_status: Option<ValidationStatus>,
    pub preferred_bases: BTreeSet<String>,
    pub currency: Option<String>,
    /// Committed search term; keystrokes land here only after the debounce window.
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            position: None,
            roles: [CrewRole::Internal, CrewRole::Freelancer].into_iter().collect(),
            status: None,
            validation_status: None,
            preferred_bases: BTreeSet::new(),
            currency: None,
            search: String::new(),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
        }
    }
}

/// One edit to a non-search filter field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Position(Option<String>),
    Roles(BTreeSet<CrewRole>),
    Status(Option<CrewStatus>),
    ValidationStatus(Option<ValidationStatus>),
    PreferredBases(BTreeSet<String>),
    Currency(Option<String>),
    Sort(SortField, SortDirection),
}

impl FilterState {
    /// Apply a change, returning whether any field actually moved.
    pub fn apply(&mut self, change: FilterChange) -> bool {
        match change {
            FilterChange::Position(position) => {
                let position = position.filter(|p| !p.trim().is_empty());
                replace(&mut self.position, position)
            }
            FilterChange::Roles(roles) => replace(&mut self.roles, roles),
            FilterChange::Status(status) => replace(&mut self.status, status),
            FilterChange::ValidationStatus(validation) => {
                replace(&mut self.validation_status, validation)
            }
            FilterChange::PreferredBases(bases) => replace(&mut self.preferred_bases, bases),
            FilterChange::Currency(currency) => replace(&mut self.currency, currency),
            FilterChange::Sort(field, direction) => {
                let field_changed = replace(&mut self.sort_field, field);
                let direction_changed = replace(&mut self.sort_direction, direction);
                field_changed || direction_changed
            }
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}
