//! Authentication and session management
//!
//! [`SessionManager`] owns the access/refresh token pair. Every API call in
//! the crate goes through [`SessionManager::request`], which attaches the
//! bearer token, refreshes it once on a 401 and tears the session down when
//! the refresh cannot save it.

mod session;
mod store;
mod types;

use std::sync::Arc;

use log::{debug, info, warn};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use url::Url;

use crate::config::ClientOptions;
use crate::error::{ApiError, Error, ErrorKind};
use crate::fetch::{Fetch, FetchBuilder};
use crate::types::{ActionMessage, Listing, Page};

pub use session::*;
pub use store::*;
pub use types::*;

/// Client for authentication and the authenticated request pipeline
pub struct SessionManager {
    base_url: Url,
    http_client: Client,
    options: ClientOptions,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Create a new session manager on top of `store`
    pub fn new(options: ClientOptions, store: Arc<dyn SessionStore>) -> Result<Self, Error> {
        let base_url = options.base_url()?;

        let mut builder = Client::builder();
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {}", e)))?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            base_url,
            http_client,
            options,
            store,
            events,
        })
    }

    /// The API base every path is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    /// The persisted session, if any
    pub fn session(&self) -> Result<Option<Session>, Error> {
        Session::load(self.store.as_ref())
    }

    /// Whether an access token is stored
    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.get(ACCESS_KEY), Ok(Some(_)))
    }

    /// The stored user, if known
    pub fn user(&self) -> Option<User> {
        self.session().ok().flatten().and_then(|s| s.user)
    }

    /// Tell subscribers the user has to log in
    pub fn require_login(&self) {
        self.emit(SessionEvent::LoginRequired {
            redirect_to: self.options.login_route.clone(),
        });
    }

    /// Send `request` with the current bearer token, refreshing it once on a 401
    ///
    /// Only 2xx responses are returned as `Ok`. A 401 that survives the
    /// refresh, a failed refresh, or a 401 without any refresh token clears
    /// the session and yields [`ErrorKind::AuthExpired`].
    pub async fn request(&self, request: &FetchBuilder) -> Result<Response, Error> {
        let access = self.store.get(ACCESS_KEY)?;
        let response = self.dispatch(request, access.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check(response).await;
        }

        let Some(refresh) = self.store.get(REFRESH_KEY)? else {
            debug!("{} {} returned 401 and no refresh token is stored", request.method(), request.path());
            return Err(self.teardown());
        };

        debug!("{} {} returned 401, refreshing access token", request.method(), request.path());
        let access = match self.refresh_with(&refresh).await {
            Ok(access) => access,
            Err(e) => {
                warn!("Token refresh failed: {}", e);
                return Err(self.teardown());
            }
        };

        let retried = self.dispatch(request, Some(&access)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!("{} {} still unauthorized after refresh", request.method(), request.path());
            return Err(self.teardown());
        }
        Self::check(retried).await
    }

    /// Send `request` and decode a JSON body
    pub async fn request_json<T: DeserializeOwned>(&self, request: &FetchBuilder) -> Result<T, Error> {
        let response = self.request(request).await?;
        Self::decode(response).await
    }

    /// Send `request` and discard the body
    pub async fn request_empty(&self, request: &FetchBuilder) -> Result<(), Error> {
        self.request(request).await?;
        Ok(())
    }

    async fn dispatch(&self, request: &FetchBuilder, bearer: Option<&str>) -> Result<Response, Error> {
        let req = request.build(&self.http_client, &self.base_url, bearer)?;
        let response = req.send().await.map_err(|e| {
            debug!("{} {} failed without response: {}", request.method(), request.path(), e);
            ApiError::from_transport(&e)
        })?;
        Ok(response)
    }

    async fn check(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_response(status, &body).into())
    }

    pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    fn teardown(&self) -> Error {
        if let Err(e) = Session::clear(self.store.as_ref()) {
            warn!("Failed to clear session: {}", e);
        }
        info!("Session ended, login required");
        self.require_login();
        ApiError::auth_expired().into()
    }

    /// Exchange the stored refresh token for a new access token
    pub async fn refresh(&self) -> Result<String, Error> {
        let refresh = self
            .store
            .get(REFRESH_KEY)?
            .ok_or_else(|| Error::Api(ApiError::auth_expired()))?;
        self.refresh_with(&refresh).await
    }

    async fn refresh_with(&self, refresh: &str) -> Result<String, Error> {
        let request = Fetch::post(self.options.refresh_path.as_str()).json(&serde_json::json!({ "refresh": refresh }))?;
        let response = Self::check(self.dispatch(&request, None).await?).await?;
        let token: RefreshedToken = Self::decode(response).await?;

        self.store.set(ACCESS_KEY, &token.access)?;
        if let Some(rotated) = &token.refresh {
            self.store.set(REFRESH_KEY, rotated)?;
        }
        debug!("Access token refreshed");
        log_token(&token.access);
        self.emit(SessionEvent::TokenRefreshed);
        Ok(token.access)
    }

    /// Sign in with username and password
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, Error> {
        let request = Fetch::post(self.options.token_path.as_str()).json(credentials)?;
        let response = Self::check(self.dispatch(&request, None).await?).await?;
        let tokens: TokenPair = Self::decode(response).await?;

        let mut session = Session::new(tokens.access, Some(tokens.refresh));
        session.save(self.store.as_ref())?;
        log_token(&session.access_token);

        // Login stands even when the profile cannot be fetched
        match self.current_user().await {
            Ok(user) => session.user = Some(user),
            Err(e) if e.kind() == Some(ErrorKind::AuthExpired) => return Err(e),
            Err(e) => warn!("Signed in but could not load the profile: {}", e),
        }

        info!("Signed in as {}", credentials.username);
        self.emit(SessionEvent::SignedIn {
            username: credentials.username.clone(),
        });
        Ok(session)
    }

    /// Create an account; the backend signs the new user in right away
    pub async fn register(&self, registration: &Registration) -> Result<Session, Error> {
        let request = Fetch::post("users/register/").json(registration)?;
        let response = Self::check(self.dispatch(&request, None).await?).await?;
        let registered: RegisteredUser = Self::decode(response).await?;

        let session = Session::new(registered.access, Some(registered.refresh)).with_user(registered.user);
        session.save(self.store.as_ref())?;
        log_token(&session.access_token);

        info!("Registered {}", registration.username);
        self.emit(SessionEvent::SignedIn {
            username: registration.username.clone(),
        });
        Ok(session)
    }

    /// Ask the backend to mail a password-reset link to `email`
    ///
    /// Returns the server's confirmation message, empty when it sends none.
    pub async fn forgot_password(&self, email: &str) -> Result<String, Error> {
        let request = Fetch::post("users/forgot-password/").json(&serde_json::json!({ "email": email }))?;
        let response = Self::check(self.dispatch(&request, None).await?).await?;
        info!("Password reset requested");
        Self::action_message(response).await
    }

    /// Set a new password with the token from a reset link
    pub async fn reset_password(&self, reset: &PasswordReset) -> Result<String, Error> {
        let request = Fetch::post("users/reset-password/").json(reset)?;
        let response = Self::check(self.dispatch(&request, None).await?).await?;
        info!("Password reset for {}", reset.email);
        Self::action_message(response).await
    }

    pub(crate) async fn action_message(response: Response) -> Result<String, Error> {
        let body = response.text().await?;
        Ok(serde_json::from_str::<ActionMessage>(&body)
            .ok()
            .and_then(|m| m.message)
            .unwrap_or_default())
    }

    /// Fetch the signed-in user and store it
    pub async fn current_user(&self) -> Result<User, Error> {
        let user: User = self.request_json(&Fetch::get("users/me/")).await?;
        self.store.set(USER_KEY, &serde_json::to_string(&user)?)?;
        Ok(user)
    }

    /// All accounts (staff only)
    pub async fn list_users(&self, page: Option<u32>) -> Result<Page<User>, Error> {
        let listing: Listing<User> = self.request_json(&Fetch::get("users/").query_opt("page", page)).await?;
        Ok(listing.into_page())
    }

    /// Drop the session
    pub fn logout(&self) -> Result<(), Error> {
        Session::clear(self.store.as_ref())?;
        info!("Signed out");
        self.emit(SessionEvent::SignedOut);
        Ok(())
    }
}

fn log_token(access: &str) {
    match AccessClaims::peek(access) {
        Ok(claims) => debug!(
            "Access token for user {:?} expires at {:?}",
            claims.user_id(),
            claims.expires_at()
        ),
        Err(e) => debug!("Access token is opaque: {}", e),
    }
}
