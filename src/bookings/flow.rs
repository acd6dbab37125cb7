//! Join/leave reconciliation for one view
//!
//! Every action runs in the same order: the enrolled set is edited
//! optimistically, the request is sent, then bookings and the group detail
//! are fetched again and replace the optimistic state. A refused request
//! rolls the edit back. Seat counts are never computed here; they always
//! come from the last group detail the server sent.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use super::optimistic::{MembershipChange, OptimisticUpdate};
use super::{enrolled_groups, BookingsClient};
use crate::auth::SessionManager;
use crate::error::{Error, ErrorKind, Rejection};
use crate::groups::{Group, GroupFilter, GroupId, GroupsClient};
use crate::notice::{Notice, Notifier};

const MSG_JOINED: &str = "تم الانضمام إلى المجموعة بنجاح!";
const MSG_LEFT: &str = "تم مغادرة المجموعة بنجاح";
const MSG_JOIN_FAILED: &str = "حدث خطأ في الانضمام إلى المجموعة";
const MSG_LEAVE_FAILED: &str = "حدث خطأ في مغادرة المجموعة";
const MSG_GROUPS_FAILED: &str = "حدث خطأ في تحميل المجموعات";
const MSG_GROUP_FAILED: &str = "حدث خطأ في تحميل تفاصيل المجموعة";
const MSG_BOOKINGS_FAILED: &str = "حدث خطأ في تحميل حجوزاتك";

/// What a view shows for the user's membership in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Nothing loaded yet
    Unknown,
    Loading,
    Enrolled,
    NotEnrolled,
}

impl Membership {
    /// Arabic badge text
    pub fn label(self) -> &'static str {
        match self {
            Membership::Unknown => "",
            Membership::Loading => "جاري التحميل",
            Membership::Enrolled => "مسجل",
            Membership::NotEnrolled => "غير مسجل",
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
}

#[derive(Debug, Default)]
struct ViewState {
    enrolled: BTreeSet<GroupId>,
    groups: BTreeMap<GroupId, Group>,
    phase: LoadPhase,
}

/// Held for the duration of one join or leave
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Result of the post-action re-fetch; `None` where the fetch failed
struct Reconciled {
    enrolled: Option<BTreeSet<GroupId>>,
    group: Option<Group>,
}

/// Membership state of one groups view (list or detail)
pub struct BookingFlow {
    session: Arc<SessionManager>,
    groups: GroupsClient,
    bookings: BookingsClient,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ViewState>,
    busy: AtomicBool,
    attached: AtomicBool,
}

impl BookingFlow {
    pub fn new(session: Arc<SessionManager>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            groups: GroupsClient::new(session.clone()),
            bookings: BookingsClient::new(session.clone()),
            session,
            notifier,
            state: Mutex::new(ViewState::default()),
            busy: AtomicBool::new(false),
            attached: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Membership of the user in `group_id` as currently believed
    pub fn membership(&self, group_id: GroupId) -> Membership {
        let state = self.lock();
        match state.phase {
            LoadPhase::Loading => Membership::Loading,
            _ if state.enrolled.contains(&group_id) => Membership::Enrolled,
            LoadPhase::Loaded => Membership::NotEnrolled,
            LoadPhase::Idle => Membership::Unknown,
        }
    }

    /// Snapshot of the enrolled set
    pub fn enrolled(&self) -> BTreeSet<GroupId> {
        self.lock().enrolled.clone()
    }

    /// Last server copy of a group
    pub fn group(&self, group_id: GroupId) -> Option<Group> {
        self.lock().groups.get(&group_id).cloned()
    }

    /// Last server copy of every group in the view
    pub fn groups(&self) -> Vec<Group> {
        self.lock().groups.values().cloned().collect()
    }

    /// A join or leave is in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether the join control should be enabled
    pub fn can_join(&self, group_id: GroupId) -> bool {
        if self.is_busy() {
            return false;
        }
        let state = self.lock();
        state.phase == LoadPhase::Loaded
            && !state.enrolled.contains(&group_id)
            && !state.groups.get(&group_id).map_or(false, |g| g.is_full)
    }

    /// Whether the leave control should be enabled
    pub fn can_leave(&self, group_id: GroupId) -> bool {
        if self.is_busy() {
            return false;
        }
        let state = self.lock();
        state.phase == LoadPhase::Loaded && state.enrolled.contains(&group_id)
    }

    /// The view went away; results arriving later are dropped
    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    fn report(&self, err: &Error, fallback: &str) {
        // An expired session already sent the user to the login route
        if err.kind() == Some(ErrorKind::AuthExpired) {
            return;
        }
        let message = match err {
            Error::Api(api) if api.kind == ErrorKind::Unexpected => fallback.to_string(),
            Error::Api(api) => api.message.clone(),
            Error::Rejected(rejection) => rejection.message().to_string(),
            _ => fallback.to_string(),
        };
        let retryable = err.api().map_or(false, |api| api.is_retryable());
        self.notifier.notify(Notice::error(message).retryable(retryable));
    }

    async fn fetch_enrolled(&self) -> Result<BTreeSet<GroupId>, Error> {
        if !self.session.is_authenticated() {
            return Ok(BTreeSet::new());
        }
        let bookings = self.bookings.list_mine().await?;
        Ok(enrolled_groups(&bookings))
    }

    fn begin_loading(&self) {
        self.lock().phase = LoadPhase::Loading;
    }

    fn finish_loading(&self, enrolled: &Result<BTreeSet<GroupId>, Error>) {
        let mut state = self.lock();
        match enrolled {
            Ok(set) => {
                state.enrolled = set.clone();
                state.phase = LoadPhase::Loaded;
            }
            Err(_) => state.phase = LoadPhase::Idle,
        }
    }

    /// Load a detail view: the group and the user's bookings
    pub async fn load_group(&self, group_id: GroupId) -> Result<Group, Error> {
        self.begin_loading();
        let group = self.groups.get(group_id).await;
        let enrolled = self.fetch_enrolled().await;
        if !self.is_attached() {
            return group;
        }

        self.finish_loading(&enrolled);
        match &group {
            Ok(g) => {
                self.lock().groups.insert(g.id, g.clone());
            }
            Err(e) if e.kind() == Some(ErrorKind::NotFound) => {
                self.lock().groups.remove(&group_id);
            }
            Err(_) => {}
        }

        if let Err(e) = &enrolled {
            self.report(e, MSG_BOOKINGS_FAILED);
        }
        if let Err(e) = &group {
            self.report(e, MSG_GROUP_FAILED);
        }
        group
    }

    /// Load a list view: matching groups and the user's bookings
    pub async fn load_groups(&self, filter: &GroupFilter) -> Result<Vec<Group>, Error> {
        self.begin_loading();
        let page = self.groups.list(filter).await;
        let enrolled = self.fetch_enrolled().await;
        if !self.is_attached() {
            return page.map(|p| p.results);
        }

        self.finish_loading(&enrolled);
        if let Ok(page) = &page {
            let mut state = self.lock();
            state.groups = page.results.iter().map(|g| (g.id, g.clone())).collect();
        }

        if let Err(e) = &enrolled {
            self.report(e, MSG_BOOKINGS_FAILED);
        }
        if let Err(e) = &page {
            self.report(e, MSG_GROUPS_FAILED);
        }
        page.map(|p| p.results)
    }

    /// Join `group_id`
    pub async fn join(&self, group_id: GroupId) -> Result<(), Error> {
        self.run(MembershipChange::Join(group_id)).await
    }

    /// Leave `group_id`
    pub async fn leave(&self, group_id: GroupId) -> Result<(), Error> {
        self.run(MembershipChange::Leave(group_id)).await
    }

    async fn run(&self, change: MembershipChange) -> Result<(), Error> {
        let group_id = change.group_id();

        if !self.session.is_authenticated() {
            self.session.require_login();
            let rejection = Rejection::LoginRequired;
            self.notifier.notify(Notice::error(rejection.message()));
            return Err(rejection.into());
        }

        let _busy = BusyGuard::acquire(&self.busy).ok_or(Error::Rejected(Rejection::Busy))?;

        let mut update = OptimisticUpdate::new(change);
        let refused = {
            let mut state = self.lock();
            // Rollback must never restore a pre-load snapshot
            if state.phase != LoadPhase::Loaded {
                debug!("Refusing change to group {} before memberships are loaded", group_id);
                return Err(Rejection::Loading.into());
            }
            let enrolled = state.enrolled.contains(&group_id);
            let full = state.groups.get(&group_id).map_or(false, |g| g.is_full);
            let refused = match change {
                MembershipChange::Join(_) if enrolled => Some(Rejection::AlreadyEnrolled),
                MembershipChange::Join(_) if full => Some(Rejection::GroupFull),
                MembershipChange::Leave(_) if !enrolled => Some(Rejection::NotEnrolled),
                _ => None,
            };
            if refused.is_none() {
                update.apply(&mut state.enrolled);
            }
            refused
        };
        if let Some(rejection) = refused {
            self.notifier.notify(Notice::error(rejection.message()));
            return Err(rejection.into());
        }

        let result = match change {
            MembershipChange::Join(id) => self.bookings.join(id).await,
            MembershipChange::Leave(id) => self.bookings.leave(id).await,
        };
        if !self.is_attached() {
            debug!("View detached, dropping result for group {}", group_id);
            return result.map(|_| ());
        }

        match result {
            Ok(message) => {
                let reconciled = self.reconcile(group_id).await;
                if !self.is_attached() {
                    return Ok(());
                }
                {
                    let mut state = self.lock();
                    update.commit(&mut state.enrolled, reconciled.enrolled);
                    if let Some(group) = reconciled.group {
                        state.groups.insert(group.id, group);
                    }
                }
                let message = if message.is_empty() {
                    match change {
                        MembershipChange::Join(_) => MSG_JOINED.to_string(),
                        MembershipChange::Leave(_) => MSG_LEFT.to_string(),
                    }
                } else {
                    message
                };
                self.notifier.notify(Notice::success(message));
                Ok(())
            }
            Err(err) => {
                update.rollback(&mut self.lock().enrolled);
                let fallback = match change {
                    MembershipChange::Join(_) => MSG_JOIN_FAILED,
                    MembershipChange::Leave(_) => MSG_LEAVE_FAILED,
                };
                self.report(&err, fallback);
                Err(err)
            }
        }
    }

    /// Fetch bookings, then the group detail, after a successful action
    async fn reconcile(&self, group_id: GroupId) -> Reconciled {
        let enrolled = match self.fetch_enrolled().await {
            Ok(set) => Some(set),
            Err(e) => {
                warn!("Could not re-fetch bookings: {}", e);
                None
            }
        };
        let group = match self.groups.get(group_id).await {
            Ok(group) => Some(group),
            Err(e) => {
                warn!("Could not re-fetch group {}: {}", group_id, e);
                None
            }
        };
        Reconciled { enrolled, group }
    }
}
