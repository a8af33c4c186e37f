//! Query builder: filter state plus offset into a declarative roster query.
//!
//! The same [`RosterQuery`] is compiled to SQL by the roster repository and
//! evaluated in memory by the fallback dataset, so both paths share one set of
//! predicate semantics.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{CrewRecord, FilterState, SortDirection, SortField};

/// Crew columns a predicate can refer to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Position,
    Status,
    ValidationStatus,
    Currency,
    Role,
    PreferredBases,
    FullName,
    Email,
}

impl Field {
    pub fn column(&self) -> &'static str {
        match self {
            Field::Position => "position",
            Field::Status => "status",
            Field::ValidationStatus => "validation_status",
            Field::Currency => "currency",
            Field::Role => "role",
            Field::PreferredBases => "preferred_bases",
            Field::FullName => "full_name",
            Field::Email => "email",
        }
    }

    fn scalar<'a>(&self, record: &'a CrewRecord) -> Option<&'a str> {
        match self {
            Field::Position => Some(&record.position),
            Field::Status => Some(record.status.as_str()),
            Field::ValidationStatus => Some(record.validation_status.as_str()),
            Field::Currency => record.currency.as_deref(),
            Field::Role => Some(record.role.as_str()),
            Field::PreferredBases => None,
            Field::FullName => Some(&record.full_name),
            Field::Email => record.email.as_deref(),
        }
    }

    fn list<'a>(&self, record: &'a CrewRecord) -> &'a [String] {
        match self {
            Field::PreferredBases => &record.preferred_bases,
            _ => &[],
        }
    }
}

/// A single filter condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Column equals value.
    Eq { field: Field, value: String },
    /// Column is one of the values.
    In { field: Field, values: Vec<String> },
    /// List column contains every value.
    ContainsAll { field: Field, values: Vec<String> },
    /// Case-insensitive substring match against any of the fields.
    Search { fields: Vec<Field>, needle: String },
}

impl Predicate {
    pub fn matches(&self, record: &CrewRecord) -> bool {
        match self {
            Predicate::Eq { field, value } => field.scalar(record) == Some(value.as_str()),
            Predicate::In { field, values } => field
                .scalar(record)
                .is_some_and(|actual| values.iter().any(|v| v == actual)),
            Predicate::ContainsAll { field, values } => {
                let have = field.list(record);
                values.iter().all(|v| have.contains(v))
            }
            Predicate::Search { fields, needle } => {
                let needle = needle.to_lowercase();
                fields.iter().any(|field| {
                    field
                        .scalar(record)
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self.field {
            SortField::FullName => "full_name",
            SortField::Position => "position",
            SortField::Status => "status",
            SortField::ValidationStatus => "validation_status",
            SortField::YearsOfExperience => "years_of_experience",
            SortField::LastActive => "last_active",
        }
    }

    /// Order two records by this key. Missing values sort first ascending.
    pub fn compare(&self, a: &CrewRecord, b: &CrewRecord) -> Ordering {
        let ordering = match self.field {
            SortField::FullName => a.full_name.cmp(&b.full_name),
            SortField::Position => a.position.cmp(&b.position),
            SortField::Status => a.status.as_str().cmp(b.status.as_str()),
            SortField::ValidationStatus => a
                .validation_status
                .as_str()
                .cmp(b.validation_status.as_str()),
            SortField::YearsOfExperience => a.years_of_experience.cmp(&b.years_of_experience),
            SortField::LastActive => a.last_active.cmp(&b.last_active),
        };
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// Inclusive row window `[from, to]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowRange {
    pub from: usize,
    pub to: usize,
}

impl RowRange {
    /// Rows covered; zero for an inverted range.
    pub fn limit(&self) -> usize {
        (self.to + 1).saturating_sub(self.from)
    }
}

/// Declarative description of one roster page request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterQuery {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub range: RowRange,
}

impl RosterQuery {
    pub fn matches(&self, record: &CrewRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    pub fn compare(&self, a: &CrewRecord, b: &CrewRecord) -> Ordering {
        self.sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Run the query over an in-memory roster.
    ///
    /// Returns the rows inside the range and the number of rows matching
    /// before the range was applied.
    pub fn evaluate(&self, records: &[CrewRecord]) -> (Vec<CrewRecord>, usize) {
        let mut matching: Vec<&CrewRecord> = records.iter().filter(|r| self.matches(r)).collect();
        matching.sort_by(|a, b| self.compare(a, b));
        let total = matching.len();
        let rows = matching
            .into_iter()
            .skip(self.range.from)
            .take(self.range.limit())
            .cloned()
            .collect();
        (rows, total)
    }
}

/// Fields the free-text search looks at.
pub const SEARCH_FIELDS: [Field; 2] = [Field::FullName, Field::Email];

/// Map filter state and a row offset into a query description.
///
/// Unset filters produce no predicate. An empty role set means any role.
/// A query is returned even without a position; the caller must not run it.
pub fn build_query(filters: &FilterState, offset: usize, page_size: usize) -> RosterQuery {
    let mut predicates = Vec::new();

    if let Some(position) = &filters.position {
        predicates.push(Predicate::Eq {
            field: Field::Position,
            value: position.clone(),
        });
    }
    if !filters.roles.is_empty() {
        predicates.push(Predicate::In {
            field: Field::Role,
            values: filters.roles.iter().map(|r| r.as_str().to_string()).collect(),
        });
    }
    if let Some(status) = filters.status {
        predicates.push(Predicate::Eq {
            field: Field::Status,
            value: status.as_str().to_string(),
        });
    }
    if let Some(validation) = filters.validation_status {
        predicates.push(Predicate::Eq {
            field: Field::ValidationStatus,
            value: validation.as_str().to_string(),
        });
    }
    if !filters.preferred_bases.is_empty() {
        predicates.push(Predicate::ContainsAll {
            field: Field::PreferredBases,
            values: filters.preferred_bases.iter().cloned().collect(),
        });
    }
    if let Some(currency) = &filters.currency {
        predicates.push(Predicate::Eq {
            field: Field::Currency,
            value: currency.clone(),
        });
    }
    let needle = filters.search.trim();
    if !needle.is_empty() {
        predicates.push(Predicate::Search {
            fields: SEARCH_FIELDS.to_vec(),
            needle: needle.to_string(),
        });
    }

    let mut sort = vec![SortKey {
        field: filters.sort_field,
        direction: filters.sort_direction,
    }];
    if filters.sort_field != SortField::FullName {
        sort.push(SortKey {
            field: SortField::FullName,
            direction: SortDirection::Asc,
        });
    }

    let page_size = page_size.max(1);
    RosterQuery {
        predicates,
        sort,
        range: RowRange {
            from: offset,
            to: offset + page_size - 1,
        },
    }
}
