//! Class groups: browsing for everyone, management for staff

mod types;

use std::sync::Arc;

use crate::auth::SessionManager;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::types::{Listing, Page};

pub use types::*;

/// Client for the `groups/` endpoints
#[derive(Clone)]
pub struct GroupsClient {
    session: Arc<SessionManager>,
}

impl GroupsClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// List groups matching `filter`
    pub async fn list(&self, filter: &GroupFilter) -> Result<Page<Group>, Error> {
        let request = Fetch::get("groups/")
            .query_opt("search", filter.search.as_deref())
            .query_opt("stage", filter.stage.as_ref())
            .query_opt("ordering", filter.ordering.as_deref())
            .query_opt("page", filter.page);
        let listing: Listing<Group> = self.session.request_json(&request).await?;
        Ok(listing.into_page())
    }

    /// Group detail, including roster and seat counts
    pub async fn get(&self, id: GroupId) -> Result<Group, Error> {
        self.session.request_json(&Fetch::get(format!("groups/{}/", id))).await
    }

    /// Create a group (staff only)
    pub async fn create(&self, group: &NewGroup) -> Result<Group, Error> {
        self.session.request_json(&Fetch::post("groups/create/").json(group)?).await
    }

    /// Update a group (staff only)
    pub async fn update(&self, id: GroupId, update: &GroupUpdate) -> Result<Group, Error> {
        self.session
            .request_json(&Fetch::put(format!("groups/{}/", id)).json(update)?)
            .await
    }

    /// Delete a group and, through the backend cascade, its bookings (staff only)
    pub async fn delete(&self, id: GroupId) -> Result<(), Error> {
        self.session.request_empty(&Fetch::delete(format!("groups/{}/", id))).await
    }
}
