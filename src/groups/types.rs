//! Types for class groups

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Group identity
pub type GroupId = i64;

/// Grade-level category
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    /// Sixth grade of primary school
    Grade6,
    /// Preparatory (middle) school
    Prep,
    /// A stage this client does not know yet
    Other(String),
}

impl Stage {
    /// Wire value
    pub fn as_str(&self) -> &str {
        match self {
            Stage::Grade6 => "GRADE6",
            Stage::Prep => "PREP",
            Stage::Other(s) => s,
        }
    }

    /// Arabic label; unknown stages show their wire value
    pub fn display_name(&self) -> &str {
        match self {
            Stage::Grade6 => "سادس ابتدائي",
            Stage::Prep => "إعدادي",
            Stage::Other(s) => s,
        }
    }
}

impl From<String> for Stage {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GRADE6" => Stage::Grade6,
            "PREP" => Stage::Prep,
            _ => Stage::Other(value),
        }
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.as_str().to_string()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roster entry embedded in a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// A scheduled class cohort
///
/// `seats_left` and `is_full` are computed by the server and are the only
/// seat numbers this crate trusts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub stage: Stage,
    pub capacity: u32,
    pub seats_left: i64,
    pub schedule: String,
    #[serde(default)]
    pub days: String,
    #[serde(default)]
    pub is_full: bool,
    #[serde(default)]
    pub students: Vec<StudentSummary>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Group {
    /// Seats taken according to the server
    pub fn booked(&self) -> i64 {
        i64::from(self.capacity) - self.seats_left
    }

    /// "مكتملة" (full) or "متاحة" (open)
    pub fn availability_label(&self) -> &'static str {
        if self.is_full {
            "مكتملة"
        } else {
            "متاحة"
        }
    }
}

/// Filters for listing groups
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    /// Case-insensitive name search
    pub search: Option<String>,
    pub stage: Option<Stage>,
    /// Django ordering expression, e.g. `-created_at`
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

impl GroupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, value: &str) -> Self {
        self.search = Some(value.to_string());
        self
    }

    pub fn stage(mut self, value: Stage) -> Self {
        self.stage = Some(value);
        self
    }

    pub fn ordering(mut self, value: &str) -> Self {
        self.ordering = Some(value.to_string());
        self
    }

    pub fn page(mut self, value: u32) -> Self {
        self.page = Some(value);
        self
    }
}

/// Fields for creating a group
#[derive(Debug, Clone, Serialize)]
pub struct NewGroup {
    pub name: String,
    pub stage: Stage,
    pub capacity: u32,
    pub schedule: String,
    pub days: String,
}

/// Partial group update; unset fields are left alone
#[derive(Debug, Clone, Default, Serialize)]
pub struct GroupUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// The server refuses values below the current enrollment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<String>,
}
