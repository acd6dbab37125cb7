//! Bookings: a student's membership in a group
//!
//! [`BookingsClient`] is the thin HTTP layer. [`BookingFlow`] keeps a view's
//! idea of "groups I joined" in step with the server across join and leave.

mod flow;
mod optimistic;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::auth::SessionManager;
use crate::error::{ApiError, Error, ErrorKind, Rejection};
use crate::fetch::Fetch;
use crate::groups::GroupId;
use crate::types::Listing;

pub use flow::*;
pub use optimistic::*;

/// One student's membership in one group
///
/// The backend sends `student` and `group` as raw ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    #[serde(rename = "student")]
    pub student_id: i64,
    #[serde(rename = "group")]
    pub group_id: GroupId,
    #[serde(rename = "booked_at", alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Groups covered by `bookings`
pub fn enrolled_groups(bookings: &[Booking]) -> BTreeSet<GroupId> {
    bookings.iter().map(|b| b.group_id).collect()
}

/// Client for the `bookings/` endpoints
#[derive(Clone)]
pub struct BookingsClient {
    session: Arc<SessionManager>,
}

impl BookingsClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// The signed-in student's bookings
    pub async fn list_mine(&self) -> Result<Vec<Booking>, Error> {
        let listing: Listing<Booking> = self.session.request_json(&Fetch::get("bookings/")).await?;
        Ok(listing.into_items())
    }

    /// Bookings of one student, for profile pages
    pub async fn list_for_student(&self, student_id: i64) -> Result<Vec<Booking>, Error> {
        let request = Fetch::get("bookings/").query("student", student_id);
        let listing: Listing<Booking> = self.session.request_json(&request).await?;
        Ok(listing.into_items())
    }

    pub async fn get(&self, id: i64) -> Result<Booking, Error> {
        self.session.request_json(&Fetch::get(format!("bookings/{}/", id))).await
    }

    /// Join a group and return the server's confirmation message
    ///
    /// The backend answers 201 for a new booking and 200 when the student
    /// was already a member; the latter is reported as a conflict.
    pub async fn join(&self, group_id: GroupId) -> Result<String, Error> {
        let response = self
            .session
            .request(&Fetch::post(format!("bookings/group/{}/join/", group_id)))
            .await?;
        let status = response.status();
        let message = SessionManager::action_message(response).await?;

        if status != StatusCode::CREATED {
            let message = if message.is_empty() {
                Rejection::AlreadyEnrolled.message().to_string()
            } else {
                message
            };
            let mut err = ApiError::new(ErrorKind::Conflict).with_message(message);
            err.status = Some(status);
            return Err(err.into());
        }
        Ok(message)
    }

    /// Leave a group and return the server's confirmation message
    pub async fn leave(&self, group_id: GroupId) -> Result<String, Error> {
        let response = self
            .session
            .request(&Fetch::post(format!("bookings/group/{}/leave/", group_id)))
            .await?;
        SessionManager::action_message(response).await
    }

    /// Every booking in the system (staff only)
    pub async fn list_all(&self) -> Result<Vec<Booking>, Error> {
        let listing: Listing<Booking> = self.session.request_json(&Fetch::get("bookings/admin/")).await?;
        Ok(listing.into_items())
    }

    /// Cancel a booking by id
    pub async fn delete(&self, id: i64) -> Result<(), Error> {
        self.session.request_empty(&Fetch::delete(format!("bookings/{}/", id))).await
    }
}
