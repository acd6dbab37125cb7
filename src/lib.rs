//! Tutor Booking Rust Client Library
//!
//! A Rust client for the English-tutoring booking API: sign in, browse class
//! groups, join and leave them, and run the staff dashboard operations.
//!
//! All requests share one [`auth::SessionManager`], which keeps the JWT
//! session alive across access-token expiry.

pub mod auth;
pub mod bookings;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod groups;
pub mod notice;
pub mod students;
pub mod types;

use std::sync::Arc;

use crate::auth::{FileStore, MemoryStore, SessionManager, SessionStore};
use crate::bookings::{BookingFlow, BookingsClient};
use crate::config::ClientOptions;
use crate::dashboard::DashboardClient;
use crate::error::Error;
use crate::groups::GroupsClient;
use crate::notice::Notifier;
use crate::students::StudentsClient;

/// The main entry point for the booking client
#[derive(Clone)]
pub struct TutorBooking {
    session: Arc<SessionManager>,
    options: ClientOptions,
}

impl TutorBooking {
    /// Create a client with an in-memory session
    ///
    /// # Example
    ///
    /// ```
    /// use tutor_booking::TutorBooking;
    ///
    /// let client = TutorBooking::new("http://127.0.0.1:8000/api/").unwrap();
    /// assert!(!client.auth().is_authenticated());
    /// ```
    pub fn new(api_url: &str) -> Result<Self, Error> {
        Self::new_with_options(ClientOptions::default().with_api_url(api_url))
    }

    /// Create a client with custom options
    ///
    /// The session is persisted to `options.session_file` when one is set.
    pub fn new_with_options(options: ClientOptions) -> Result<Self, Error> {
        let store: Arc<dyn SessionStore> = match &options.session_file {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        Self::with_store(options, store)
    }

    /// Create a client on top of an existing session store
    pub fn with_store(options: ClientOptions, store: Arc<dyn SessionStore>) -> Result<Self, Error> {
        let session = Arc::new(SessionManager::new(options.clone(), store)?);
        Ok(Self { session, options })
    }

    /// Create a client from `TUTOR_BOOKING_*` environment variables
    pub fn from_env() -> Result<Self, Error> {
        Self::new_with_options(ClientOptions::from_env()?)
    }

    /// The client options
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Session, login and account operations
    pub fn auth(&self) -> &SessionManager {
        &self.session
    }

    /// Shared handle to the session manager
    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    pub fn groups(&self) -> GroupsClient {
        GroupsClient::new(self.session.clone())
    }

    pub fn bookings(&self) -> BookingsClient {
        BookingsClient::new(self.session.clone())
    }

    pub fn students(&self) -> StudentsClient {
        StudentsClient::new(self.session.clone())
    }

    /// Staff dashboard summary
    pub fn dashboard(&self) -> DashboardClient {
        DashboardClient::new(self.session.clone())
    }

    /// Start a join/leave flow for one view
    pub fn booking_flow(&self, notifier: Arc<dyn Notifier>) -> BookingFlow {
        BookingFlow::new(self.session.clone(), notifier)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{Credentials, PasswordReset, Registration, SessionEvent};
    pub use crate::bookings::{Booking, BookingFlow, Membership};
    pub use crate::config::ClientOptions;
    pub use crate::error::{ApiError, Error, ErrorKind, Rejection};
    pub use crate::groups::{Group, GroupFilter, GroupId, Stage};
    pub use crate::notice::{LogNotifier, Notice, NoticeLevel, Notifier};
    pub use crate::TutorBooking;
}
