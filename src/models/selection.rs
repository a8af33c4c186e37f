//! Selection record model.

use serde::{Deserialize, Serialize};

use super::{CrewRecord, CrewRole};

/// Narrow projection of a crew record kept for every selected member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    pub id: String,
    pub full_name: String,
    pub position: String,
    pub role: CrewRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl SelectionRecord {
    /// Stand-in for an initially selected id whose record was not supplied.
    ///
    /// Replaced by the real projection as soon as the member shows up in a
    /// loaded roster.
    pub fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            full_name: String::new(),
            position: String::new(),
            role: CrewRole::default(),
            currency: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.full_name.is_empty() && self.position.is_empty()
    }
}

impl From<&CrewRecord> for SelectionRecord {
    fn from(record: &CrewRecord) -> Self {
        Self {
            id: record.id.clone(),
            full_name: record.full_name.clone(),
            position: record.position.clone(),
            role: record.role,
            currency: record.currency.clone(),
        }
    }
}
