//! Session data and its persisted form

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::store::{SessionStore, ACCESS_KEY, REFRESH_KEY, USER_KEY};
use super::types::User;
use crate::error::Error;

/// Session data
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The access token
    pub access_token: String,

    /// The refresh token
    pub refresh_token: Option<String>,

    /// The signed-in user, once known
    pub user: Option<User>,
}

impl Session {
    /// Create a new session
    pub fn new(access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
            user: None,
        }
    }

    /// Attach the user
    pub fn with_user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    /// Read the session from `store`; `None` without an access token
    pub fn load(store: &dyn SessionStore) -> Result<Option<Self>, Error> {
        let Some(access_token) = store.get(ACCESS_KEY)? else {
            return Ok(None);
        };
        let refresh_token = store.get(REFRESH_KEY)?;
        let user = match store.get(USER_KEY)? {
            Some(json) => match serde_json::from_str(&json) {
                Ok(user) => Some(user),
                Err(e) => {
                    log::warn!("Ignoring unreadable stored user: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Some(Self {
            access_token,
            refresh_token,
            user,
        }))
    }

    /// Write all three keys; absent parts are removed
    pub fn save(&self, store: &dyn SessionStore) -> Result<(), Error> {
        store.set(ACCESS_KEY, &self.access_token)?;
        match &self.refresh_token {
            Some(refresh) => store.set(REFRESH_KEY, refresh)?,
            None => store.remove(REFRESH_KEY)?,
        }
        match &self.user {
            Some(user) => store.set(USER_KEY, &serde_json::to_string(user)?)?,
            None => store.remove(USER_KEY)?,
        }
        Ok(())
    }

    /// Remove all three keys
    pub fn clear(store: &dyn SessionStore) -> Result<(), Error> {
        store.remove(ACCESS_KEY)?;
        store.remove(REFRESH_KEY)?;
        store.remove(USER_KEY)
    }

    /// Claims of the access token, without verifying its signature
    pub fn claims(&self) -> Result<AccessClaims, Error> {
        AccessClaims::peek(&self.access_token)
    }

    /// Whether the access token has expired; `false` when it cannot be read
    pub fn is_expired(&self) -> bool {
        self.claims()
            .ok()
            .and_then(|c| c.expires_at())
            .map(|exp| exp <= Utc::now())
            .unwrap_or(false)
    }
}

/// Claims carried by a SimpleJWT access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,

    /// `"access"` or `"refresh"`
    #[serde(default)]
    pub token_type: Option<String>,

    /// Backend user id; number or string depending on server version
    #[serde(default)]
    pub user_id: Option<Value>,
}

impl AccessClaims {
    /// Decode the payload only. Signature checks belong to the backend.
    pub fn peek(token: &str) -> Result<Self, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| Error::store(format!("unreadable access token: {}", e)))?;
        Ok(data.claims)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn user_id(&self) -> Option<i64> {
        match self.user_id.as_ref()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}
