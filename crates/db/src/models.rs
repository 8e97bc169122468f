//! Row structs that map onto the `form_process_mapper` table.
//!
//! These are *persistence* models. Besides the full row there is one
//! projection struct per listing operation, each naming the columns it reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Process key stored when a mapper is created without one.
pub const DEFAULT_PROCESS_KEY: &str = "Defaultflow";
/// Process name stored when a mapper is created without one.
pub const DEFAULT_PROCESS_NAME: &str = "Default Flow";

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// Lifecycle status of a mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MapperStatus {
    Active,
    #[default]
    Inactive,
}

impl MapperStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for MapperStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MapperStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active"   => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other      => Err(format!("unknown mapper status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// form_process_mapper
// ---------------------------------------------------------------------------

/// A persisted form process mapper row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FormProcessMapperRow {
    pub id: i64,
    pub form_id: String,
    pub form_name: String,
    pub form_type: String,
    /// Groups every version of the same logical form.
    pub parent_form_id: String,
    pub process_key: Option<String>,
    pub process_name: Option<String>,
    pub status: MapperStatus,
    pub comments: Option<String>,
    /// `None` means the row is visible to every tenant.
    pub tenant: Option<String>,
    /// `None` for a shared process definition.
    pub process_tenant: Option<String>,
    pub is_anonymous: Option<bool>,
    pub deleted: bool,
    pub task_variable: Option<serde_json::Value>,
    pub version: i32,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub created_by: String,
    pub modified: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
}

/// The latest row id of one lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LatestMapperId {
    pub id: i64,
    pub parent_form_id: String,
}

// ---------------------------------------------------------------------------
// listing projections
// ---------------------------------------------------------------------------

/// A fixed column subset read by one listing operation.
pub trait Projection: for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin {
    const COLUMNS: &'static str;
}

/// Row shape returned by `find_all_forms`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FormListItem {
    pub id: i64,
    pub process_key: Option<String>,
    pub form_id: String,
    pub form_name: String,
    pub modified: Option<DateTime<Utc>>,
    pub status: MapperStatus,
    pub is_anonymous: Option<bool>,
    pub form_type: String,
    pub created: DateTime<Utc>,
    pub description: Option<String>,
}

impl Projection for FormListItem {
    const COLUMNS: &'static str = "id, process_key, form_id, form_name, modified, status, \
        is_anonymous, form_type, created, description";
}

/// Row shape returned by `find_all_active_by_formid`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ActiveFormItem {
    pub id: i64,
    pub process_key: Option<String>,
    pub form_id: String,
    pub form_name: String,
    pub modified: Option<DateTime<Utc>>,
    pub description: Option<String>,
}

impl Projection for ActiveFormItem {
    const COLUMNS: &'static str = "id, process_key, form_id, form_name, modified, description";
}

/// Row shape returned by `find_all_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ActiveMapperItem {
    pub id: i64,
    pub process_key: Option<String>,
    pub form_id: String,
    pub form_name: String,
}

impl Projection for ActiveMapperItem {
    const COLUMNS: &'static str = "id, process_key, form_id, form_name";
}

impl Projection for FormProcessMapperRow {
    const COLUMNS: &'static str = "id, form_id, form_name, form_type, parent_form_id, \
        process_key, process_name, status, comments, tenant, process_tenant, is_anonymous, \
        deleted, task_variable, version, description, created, created_by, modified, modified_by";
}

/// One page of a listing plus the unpaged match count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total_count: i64,
}

// ---------------------------------------------------------------------------
// inputs
// ---------------------------------------------------------------------------

/// Fields accepted when creating a mapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewFormProcessMapper {
    pub form_id: String,
    pub form_name: String,
    pub form_type: String,
    pub parent_form_id: String,
    pub created_by: String,
    #[serde(default)]
    pub process_key: Option<String>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub process_tenant: Option<String>,
    #[serde(default)]
    pub status: Option<MapperStatus>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub is_anonymous: Option<bool>,
    #[serde(default)]
    pub task_variable: Option<serde_json::Value>,
    #[serde(default)]
    pub version: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl NewFormProcessMapper {
    /// Check required fields, column widths and the version range.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("form_id", &self.form_id),
            ("form_name", &self.form_name),
            ("form_type", &self.form_type),
            ("parent_form_id", &self.parent_form_id),
            ("created_by", &self.created_by),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{name} is required"));
            }
        }

        check_len("form_id", Some(self.form_id.as_str()), 50)?;
        check_len("form_name", Some(self.form_name.as_str()), 100)?;
        check_len("form_type", Some(self.form_type.as_str()), 20)?;
        check_len("parent_form_id", Some(self.parent_form_id.as_str()), 50)?;
        check_len("created_by", Some(self.created_by.as_str()), 100)?;
        check_len("process_key", self.process_key.as_deref(), 50)?;
        check_len("process_name", self.process_name.as_deref(), 100)?;
        check_len("comments", self.comments.as_deref(), 300)?;
        check_len("tenant", self.tenant.as_deref(), 100)?;
        if self.tenant.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err("tenant must not be empty; omit it for a global mapper".to_string());
        }

        match self.version {
            Some(v) if v < 1 => Err(format!("version must be positive, got {v}")),
            _ => Ok(()),
        }
    }
}

/// Patch for the mutable columns of a mapper. `None` leaves a column as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormProcessMapperPatch {
    pub form_id: Option<String>,
    pub form_name: Option<String>,
    pub form_type: Option<String>,
    pub process_key: Option<String>,
    pub process_name: Option<String>,
    pub status: Option<MapperStatus>,
    pub comments: Option<String>,
    pub modified_by: Option<String>,
    pub is_anonymous: Option<bool>,
    pub task_variable: Option<serde_json::Value>,
    pub process_tenant: Option<String>,
    pub description: Option<String>,
}

impl FormProcessMapperPatch {
    pub fn validate(&self) -> Result<(), String> {
        check_len("form_id", self.form_id.as_deref(), 50)?;
        check_len("form_name", self.form_name.as_deref(), 100)?;
        check_len("form_type", self.form_type.as_deref(), 20)?;
        check_len("process_key", self.process_key.as_deref(), 50)?;
        check_len("process_name", self.process_name.as_deref(), 100)?;
        check_len("comments", self.comments.as_deref(), 300)?;
        check_len("modified_by", self.modified_by.as_deref(), 100)
    }
}

fn check_len(name: &str, value: Option<&str>, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{name} exceeds {max} characters"))
        }
        _ => Ok(()),
    }
}
