//! Fixed illustrative roster used once the remote access-control layer fails.

use async_trait::async_trait;
use chrono::DateTime;

use super::query::{build_query, RosterQuery};
use super::store::{RosterPage, RosterStore, StoreError};
use crate::models::{CrewRecord, CrewRole, CrewStatus, FilterState, ValidationStatus};

/// A small in-memory roster filtered client-side with the query builder's
/// predicate semantics.
#[derive(Debug, Clone)]
pub struct FallbackDataset {
    records: Vec<CrewRecord>,
}

impl Default for FallbackDataset {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FallbackDataset {
    pub fn from_records(records: Vec<CrewRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CrewRecord] {
        &self.records
    }

    /// Every record matching the filters, sorted, with no paging.
    pub fn filter(&self, filters: &FilterState) -> Vec<CrewRecord> {
        let query = build_query(filters, 0, self.records.len());
        query.evaluate(&self.records).0
    }

    pub fn builtin() -> Self {
        #[rustfmt::skip]
        let rows: [(&str, &str, CrewRole, CrewStatus, &str, ValidationStatus, &[&str], u32, i64); 10] = [
            ("demo-01", "Alice Martins", CrewRole::Internal, CrewStatus::Active, "captain", ValidationStatus::Approved, &["LIS", "OPO", "FAO", "MAD"], 18, 1_714_550_400),
            ("demo-02", "Bernard Okafor", CrewRole::Freelancer, CrewStatus::Active, "captain", ValidationStatus::Approved, &["LHR", "LGW"], 22, 1_714_377_600),
            ("demo-03", "Chloe Dubois", CrewRole::Freelancer, CrewStatus::Active, "captain", ValidationStatus::Pending, &["CDG"], 9, 1_713_945_600),
            ("demo-04", "Daniel Weber", CrewRole::Internal, CrewStatus::Inactive, "captain", ValidationStatus::Approved, &["FRA", "MUC"], 27, 1_709_251_200),
            ("demo-05", "Elena Rossi", CrewRole::Internal, CrewStatus::Active, "first_officer", ValidationStatus::Approved, &["FCO", "MXP", "LIN"], 6, 1_714_636_800),
            ("demo-06", "Farid Haddad", CrewRole::Freelancer, CrewStatus::Active, "first_officer", ValidationStatus::Rejected, &["DXB"], 4, 1_712_016_000),
            ("demo-07", "Greta Lindqvist", CrewRole::Freelancer, CrewStatus::Pending, "first_officer", ValidationStatus::Pending, &[], 2, 1_711_929_600),
            ("demo-08", "Hugo Ferreira", CrewRole::Internal, CrewStatus::Active, "cabin_crew", ValidationStatus::Approved, &["LIS"], 11, 1_714_464_000),
            ("demo-09", "Ines Carvalho", CrewRole::Freelancer, CrewStatus::Active, "cabin_crew", ValidationStatus::Approved, &["OPO", "LIS"], 3, 1_714_291_200),
            ("demo-10", "Jonas Meyer", CrewRole::Admin, CrewStatus::Active, "captain", ValidationStatus::Approved, &["ZRH"], 30, 1_714_204_800),
        ];

        let records = rows
            .iter()
            .map(
                |&(id, name, role, status, position, validation, bases, years, last_active)| {
                    let slug = name.to_lowercase().replace(' ', ".");
                    CrewRecord {
                        id: id.to_string(),
                        full_name: name.to_string(),
                        email: Some(format!("{}@example.com", slug)),
                        role,
                        status,
                        position: position.to_string(),
                        validation_status: validation,
                        preferred_bases: bases.iter().map(|b| b.to_string()).collect(),
                        currency: Some("EUR".to_string()),
                        years_of_experience: Some(years),
                        last_active: DateTime::from_timestamp(last_active, 0),
                        profile_complete: validation == ValidationStatus::Approved,
                    }
                },
            )
            .collect();

        Self { records }
    }
}

#[async_trait]
impl RosterStore for FallbackDataset {
    async fn query_roster(&self, query: &RosterQuery) -> Result<RosterPage, StoreError> {
        let (rows, total) = query.evaluate(&self.records);
        Ok(RosterPage {
            rows,
            total_count: Some(total as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FilterChange;

    fn filters(changes: Vec<FilterChange>) -> FilterState {
        let mut filters = FilterState::default();
        for change in changes {
            filters.apply(change);
        }
        filters
    }

    #[test]
    fn test_builtin_ids_are_unique() {
        let dataset = FallbackDataset::builtin();
        let mut ids: Vec<_> = dataset.records().iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), dataset.records().len());
    }

    #[test]
    fn test_position_filter_excludes_admins_by_default() {
        let dataset = FallbackDataset::builtin();
        let rows = dataset.filter(&filters(vec![FilterChange::Position(Some(
            "captain".to_string(),
        ))]));

        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["demo-01", "demo-02", "demo-03", "demo-04"]);
    }

    #[test]
    fn test_status_and_validation_filters() {
        let dataset = FallbackDataset::builtin();
        let rows = dataset.filter(&filters(vec![
            FilterChange::Position(Some("captain".to_string())),
            FilterChange::Status(Some(CrewStatus::Active)),
            FilterChange::ValidationStatus(Some(ValidationStatus::Approved)),
        ]));

        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["demo-01", "demo-02"]);
    }

    #[test]
    fn test_search_in_fallback() {
        let dataset = FallbackDataset::builtin();
        let mut state = filters(vec![FilterChange::Position(Some("cabin_crew".to_string()))]);
        state.search = "carv".to_string();

        let rows = dataset.filter(&state);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_name, "Ines Carvalho");
    }

    #[tokio::test]
    async fn test_store_and_local_filter_agree() {
        let dataset = FallbackDataset::builtin();
        let state = filters(vec![
            FilterChange::Position(Some("first_officer".to_string())),
            FilterChange::Roles([CrewRole::Freelancer].into_iter().collect()),
        ]);

        let local = dataset.filter(&state);
        let remote = dataset
            .query_roster(&build_query(&state, 0, 50))
            .await
            .unwrap();

        assert_eq!(remote.rows, local);
        assert_eq!(remote.total_count, Some(2));
    }
}
