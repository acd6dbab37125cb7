//! Student profiles

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::auth::SessionManager;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::groups::Stage;
use crate::types::{Listing, Page};

/// A student profile, linked to the account that created it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    pub stage: Stage,
    #[serde(default)]
    pub notes: Option<String>,
    /// Owning account
    #[serde(default)]
    pub user: Option<i64>,
}

/// Student registration form
#[derive(Debug, Clone, Serialize)]
pub struct NewStudent {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Partial student update
#[derive(Debug, Clone, Default, Serialize)]
pub struct StudentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Filters for listing students
#[derive(Debug, Clone, Default)]
pub struct StudentFilter {
    /// Matches name, email, phone or notes
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
}

/// Client for the `students/` endpoints
#[derive(Clone)]
pub struct StudentsClient {
    session: Arc<SessionManager>,
}

impl StudentsClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Create the signed-in user's student profile
    pub async fn register(&self, student: &NewStudent) -> Result<Student, Error> {
        self.session
            .request_json(&Fetch::post("students/create/").json(student)?)
            .await
    }

    /// List students (staff dashboard)
    pub async fn list(&self, filter: &StudentFilter) -> Result<Page<Student>, Error> {
        let request = Fetch::get("students/")
            .query_opt("search", filter.search.as_deref())
            .query_opt("ordering", filter.ordering.as_deref())
            .query_opt("page", filter.page);
        let listing: Listing<Student> = self.session.request_json(&request).await?;
        Ok(listing.into_page())
    }

    pub async fn get(&self, id: i64) -> Result<Student, Error> {
        self.session.request_json(&Fetch::get(format!("students/{}/", id))).await
    }

    /// Update a profile; owners and staff only
    pub async fn update(&self, id: i64, update: &StudentUpdate) -> Result<Student, Error> {
        self.session
            .request_json(&Fetch::put(format!("students/{}/", id)).json(update)?)
            .await
    }

    /// Delete a profile and its bookings; owners and staff only
    pub async fn delete(&self, id: i64) -> Result<(), Error> {
        self.session.request_empty(&Fetch::delete(format!("students/{}/", id))).await
    }
}
