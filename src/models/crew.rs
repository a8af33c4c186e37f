//! Crew record model shared by the roster service, the HTTP client and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of preferred bases shown before collapsing the rest into a count.
pub const VISIBLE_BASES: usize = 3;

/// Account role of a crew member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrewRole {
    Admin,
    Internal,
    #[default]
    Freelancer,
}

impl CrewRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrewRole::Admin => "admin",
            CrewRole::Internal => "internal",
            CrewRole::Freelancer => "freelancer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(CrewRole::Admin),
            "internal" => Some(CrewRole::Internal),
            "freelancer" => Some(CrewRole::Freelancer),
            _ => None,
        }
    }
}

/// Lifecycle status of a crew account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrewStatus {
    Active,
    Inactive,
    #[default]
    Pending,
}

impl CrewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrewStatus::Active => "active",
            CrewStatus::Inactive => "inactive",
            CrewStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(CrewStatus::Active),
            "inactive" => Some(CrewStatus::Inactive),
            "pending" => Some(CrewStatus::Pending),
            _ => None,
        }
    }
}

/// Document validation state of a crew member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Approved,
    #[default]
    Pending,
    Rejected,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Approved => "approved",
            ValidationStatus::Pending => "pending",
            ValidationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(ValidationStatus::Approved),
            "pending" => Some(ValidationStatus::Pending),
            "rejected" => Some(ValidationStatus::Rejected),
            _ => None,
        }
    }
}

/// An immutable snapshot of one crew member as returned by a roster query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrewRecord {
    pub id: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: CrewRole,
    pub status: CrewStatus,
    pub position: String,
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub preferred_bases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_of_experience: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile_complete: bool,
}

/// Preferred bases trimmed for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSummary<'a> {
    pub shown: &'a [String],
    pub overflow: usize,
}

impl CrewRecord {
    /// First three preferred bases plus the number left out.
    pub fn base_summary(&self) -> BaseSummary<'_> {
        let shown = VISIBLE_BASES.min(self.preferred_bases.len());
        BaseSummary {
            shown: &self.preferred_bases[..shown],
            overflow: self.preferred_bases.len() - shown,
        }
    }
}

/// A crew row as it arrives over the wire, before validation.
///
/// Every field is optional here so that a missing column can be told apart
/// from a malformed payload when converting into [`CrewRecord`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCrewRow {
    pub id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub position: Option<String>,
    pub validation_status: Option<String>,
    pub preferred_bases: Option<Vec<String>>,
    pub currency: Option<String>,
    pub years_of_experience: Option<u32>,
    pub last_active: Option<DateTime<Utc>>,
    pub profile_complete: Option<bool>,
}

impl TryFrom<RawCrewRow> for CrewRecord {
    type Error = String;

    fn try_from(raw: RawCrewRow) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| "crew row without id".to_string())?;
        let full_name = raw
            .full_name
            .ok_or_else(|| format!("crew row {} without fullName", id))?;

        Ok(CrewRecord {
            id,
            full_name,
            email: raw.email,
            role: raw
                .role
                .as_deref()
                .and_then(CrewRole::parse)
                .unwrap_or_default(),
            status: raw
                .status
                .as_deref()
                .and_then(CrewStatus::parse)
                .unwrap_or_default(),
            position: raw.position.unwrap_or_default(),
            validation_status: raw
                .validation_status
                .as_deref()
                .and_then(ValidationStatus::parse)
                .unwrap_or_default(),
            preferred_bases: raw.preferred_bases.unwrap_or_default(),
            currency: raw.currency,
            years_of_experience: raw.years_of_experience,
            last_active: raw.last_active,
            profile_complete: raw.profile_complete.unwrap_or(false),
        })
    }
}

/// Request body for creating a crew member.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCrewRequest {
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: CrewRole,
    #[serde(default)]
    pub status: CrewStatus,
    pub position: String,
    #[serde(default)]
    pub validation_status: ValidationStatus,
    #[serde(default)]
    pub preferred_bases: Vec<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<u32>,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub profile_complete: bool,
}
