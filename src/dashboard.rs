//! Staff dashboard summary

use std::sync::Arc;

use log::debug;

use crate::auth::SessionManager;
use crate::bookings::{Booking, BookingsClient};
use crate::error::Error;
use crate::groups::{Group, GroupFilter, GroupsClient};
use crate::students::{Student, StudentFilter, StudentsClient};
use crate::types::Page;

/// How many bookings the activity feed shows
pub const RECENT_BOOKINGS: usize = 5;

/// Counts shown on the staff dashboard
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_groups: u64,
    pub total_students: u64,
    pub total_bookings: u64,
    /// Groups on the first page that still have seats
    pub open_groups: usize,
    /// Newest bookings first
    pub recent_bookings: Vec<Booking>,
}

impl DashboardStats {
    pub fn from_parts(groups: &Page<Group>, students: &Page<Student>, mut bookings: Vec<Booking>) -> Self {
        let total_bookings = bookings.len() as u64;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings.truncate(RECENT_BOOKINGS);

        Self {
            total_groups: groups.count,
            total_students: students.count,
            total_bookings,
            open_groups: groups.results.iter().filter(|g| !g.is_full).count(),
            recent_bookings: bookings,
        }
    }
}

/// Client for the dashboard summary (staff only)
#[derive(Clone)]
pub struct DashboardClient {
    groups: GroupsClient,
    students: StudentsClient,
    bookings: BookingsClient,
}

impl DashboardClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            groups: GroupsClient::new(session.clone()),
            students: StudentsClient::new(session.clone()),
            bookings: BookingsClient::new(session),
        }
    }

    /// Fetch groups, students and all bookings concurrently and summarize them
    pub async fn stats(&self) -> Result<DashboardStats, Error> {
        let group_filter = GroupFilter::new();
        let student_filter = StudentFilter::default();
        let (groups, students, bookings) = tokio::try_join!(
            self.groups.list(&group_filter),
            self.students.list(&student_filter),
            self.bookings.list_all()
        )?;
        debug!(
            "Dashboard: {} groups, {} students, {} bookings",
            groups.count,
            students.count,
            bookings.len()
        );
        Ok(DashboardStats::from_parts(&groups, &students, bookings))
    }
}
