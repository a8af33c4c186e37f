//! Crew repository backed by SQLite.
//!
//! Roster queries are compiled from a [`RosterQuery`] into parameterized SQL.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::BUSY_TIMEOUT;
use crate::errors::AppError;
use crate::models::{
    CreateCrewRequest, CrewRecord, CrewRole, CrewStatus, SortDirection, ValidationStatus,
};
use crate::roster::{
    classify_backend_message, Field, Predicate, RosterPage, RosterQuery, RosterStore, StoreError,
    TransientError,
};

const CREW_COLUMNS: &str = "id, full_name, email, role, status, position, validation_status, \
     preferred_bases, currency, years_of_experience, last_active, profile_complete";

/// Database repository for the crew roster.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count_crew(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM crew")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    /// Run one roster page query and count every matching row.
    pub async fn query_crew(&self, query: &RosterQuery) -> Result<RosterPage, sqlx::Error> {
        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM crew", CREW_COLUMNS));
        push_predicates(&mut select, &query.predicates);

        select.push(" ORDER BY ");
        for key in &query.sort {
            select.push(key.column());
            select.push(match key.direction {
                SortDirection::Asc => " ASC, ",
                SortDirection::Desc => " DESC, ",
            });
        }
        select.push("id ASC");

        select.push(" LIMIT ");
        select.push_bind(query.range.limit() as i64);
        select.push(" OFFSET ");
        select.push_bind(query.range.from as i64);

        let rows = select.build().fetch_all(&self.pool).await?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS total FROM crew");
        push_predicates(&mut count, &query.predicates);
        let total: i64 = count.build().fetch_one(&self.pool).await?.get("total");

        Ok(RosterPage {
            rows: rows.iter().map(crew_from_row).collect(),
            total_count: Some(total.max(0) as u64),
        })
    }

    /// Get a crew member by ID.
    pub async fn get_crew(&self, id: &str) -> Result<Option<CrewRecord>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM crew WHERE id = ?", CREW_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(crew_from_row))
    }

    /// Create a new crew member.
    pub async fn create_crew(&self, request: &CreateCrewRequest) -> Result<CrewRecord, AppError> {
        let record = CrewRecord {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: request.full_name.trim().to_string(),
            email: request.email.clone(),
            role: request.role,
            status: request.status,
            position: request.position.trim().to_string(),
            validation_status: request.validation_status,
            preferred_bases: request.preferred_bases.clone(),
            currency: request.currency.clone(),
            years_of_experience: request.years_of_experience,
            last_active: request.last_active,
            profile_complete: request.profile_complete,
        };

        let mut tx = self.pool.begin().await?;
        insert_crew(&mut tx, &record).await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Insert many records in one transaction, keeping their ids.
    pub async fn seed_crew(&self, records: &[CrewRecord]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            insert_crew(&mut tx, record).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl RosterStore for Repository {
    async fn query_roster(&self, query: &RosterQuery) -> Result<RosterPage, StoreError> {
        self.query_crew(query).await.map_err(store_error)
    }
}

async fn insert_crew(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    record: &CrewRecord,
) -> Result<(), AppError> {
    let now = Utc::now().to_rfc3339();
    let bases_json = serde_json::to_string(&record.preferred_bases)?;
    let last_active = record
        .last_active
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));

    sqlx::query(
        "INSERT INTO crew (id, full_name, email, role, status, position, validation_status, preferred_bases, currency, years_of_experience, last_active, profile_complete, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
    .bind(&record.id)
    .bind(&record.full_name)
    .bind(&record.email)
    .bind(record.role.as_str())
    .bind(record.status.as_str())
    .bind(&record.position)
    .bind(record.validation_status.as_str())
    .bind(&bases_json)
    .bind(&record.currency)
    .bind(record.years_of_experience.map(i64::from))
    .bind(&last_active)
    .bind(record.profile_complete as i32)
    .bind(&now)
    .bind(&now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Append ` WHERE a AND b ...` for the predicates, if any.
fn push_predicates(builder: &mut QueryBuilder<'_, Sqlite>, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Eq { field, value } => {
                builder.push(field.column());
                builder.push(" = ");
                builder.push_bind(value.clone());
            }
            Predicate::In { field, values } => {
                if values.is_empty() {
                    builder.push("0");
                    continue;
                }
                builder.push(field.column());
                builder.push(" IN (");
                let mut list = builder.separated(", ");
                for value in values {
                    list.push_bind(value.clone());
                }
                list.push_unseparated(")");
            }
            Predicate::ContainsAll { field, values } => {
                if values.is_empty() {
                    builder.push("1");
                    continue;
                }
                for (j, value) in values.iter().enumerate() {
                    if j > 0 {
                        builder.push(" AND ");
                    }
                    builder.push("EXISTS (SELECT 1 FROM json_each(");
                    builder.push(field.column());
                    builder.push(") WHERE json_each.value = ");
                    builder.push_bind(value.clone());
                    builder.push(")");
                }
            }
            Predicate::Search { fields, needle } => {
                if fields.is_empty() {
                    builder.push("0");
                    continue;
                }
                let needle = needle.to_lowercase();
                builder.push("(");
                for (j, field) in fields.iter().enumerate() {
                    if j > 0 {
                        builder.push(" OR ");
                    }
                    builder.push("instr(lower(COALESCE(");
                    builder.push(search_column(*field));
                    builder.push(", '')), ");
                    builder.push_bind(needle.clone());
                    builder.push(") > 0");
                }
                builder.push(")");
            }
        }
    }
}

fn search_column(field: Field) -> &'static str {
    match field {
        // Bases are a JSON array; search the raw text.
        Field::PreferredBases => "preferred_bases",
        other => other.column(),
    }
}

/// Sort a database failure into access-control or transient.
fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) => {
            let message = match db.code() {
                Some(code) => format!("{} ({})", db.message(), code),
                None => db.message().to_string(),
            };
            classify_backend_message(&message)
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Transient(TransientError::Timeout(BUSY_TIMEOUT))
        }
        sqlx::Error::Io(io) => StoreError::Transient(TransientError::Network(io.to_string())),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Transient(TransientError::Malformed(err.to_string()))
        }
        _ => classify_backend_message(&err.to_string()),
    }
}

// Helper functions for row conversion

fn crew_from_row(row: &sqlx::sqlite::SqliteRow) -> CrewRecord {
    let role: String = row.get("role");
    let status: String = row.get("status");
    let validation_status: String = row.get("validation_status");
    let bases_str: Option<String> = row.get("preferred_bases");
    let years: Option<i64> = row.get("years_of_experience");
    let last_active: Option<String> = row.get("last_active");
    let profile_complete: i32 = row.get("profile_complete");

    CrewRecord {
        id: row.get("id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        role: CrewRole::parse(&role).unwrap_or_default(),
        status: CrewStatus::parse(&status).unwrap_or_default(),
        position: row.get("position"),
        validation_status: ValidationStatus::parse(&validation_status).unwrap_or_default(),
        preferred_bases: bases_str.map(|s| parse_json_array(&s)).unwrap_or_default(),
        currency: row.get("currency"),
        years_of_experience: years.and_then(|y| u32::try_from(y).ok()),
        last_active: last_active.as_deref().and_then(parse_timestamp),
        profile_complete: profile_complete != 0,
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
