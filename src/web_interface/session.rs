//! Cookie-held session state.
//!
//! The session is serialized to JSON, base64url-encoded and signed with
//! HMAC-SHA256 under the configured secret key: `<payload>.<hex signature>`.
//! A cookie that is missing, malformed or carries a bad signature decodes to
//! an empty session.

use std::convert::Infallible;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use warp::{Filter, Rejection};

use crate::error_handling::types::WebError;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";

/// Per-browser state: the login flag and pending flash messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub logged_in: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<String>,
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        !self.logged_in && self.flashes.is_empty()
    }

    pub fn log_in(&mut self) {
        self.logged_in = true;
    }

    pub fn log_out(&mut self) {
        self.logged_in = false;
    }

    /// Queues a message for the next rendered page.
    pub fn flash(&mut self, message: impl Into<String>) {
        self.flashes.push(message.into());
    }

    pub fn take_flashes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.flashes)
    }
}

/// Signs and verifies session cookies.
pub struct SessionSigner {
    key: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, WebError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| WebError::Internal(format!("invalid session key: {}", e)))
    }

    pub fn encode(&self, session: &SessionData) -> Result<String, WebError> {
        let json = serde_json::to_vec(session)
            .map_err(|e| WebError::Internal(format!("session serialization: {}", e)))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", payload, signature))
    }

    pub fn decode(&self, value: &str) -> Option<SessionData> {
        let (payload, signature) = value.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;
        let mut mac = self.mac().ok()?;
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("Discarding session cookie with a bad signature");
            return None;
        }
        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// `Set-Cookie` value persisting `session`; an empty session expires the
    /// cookie instead.
    pub fn set_cookie(&self, session: &SessionData) -> Result<String, WebError> {
        if session.is_empty() {
            return Ok(format!(
                "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
                SESSION_COOKIE
            ));
        }
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            self.encode(session)?
        ))
    }
}

/// Extracts the session of the current request.
pub fn with_session(
    signer: Arc<SessionSigner>,
) -> impl Filter<Extract = (SessionData,), Error = Infallible> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE).map(move |cookie: Option<String>| {
        cookie
            .and_then(|value| signer.decode(&value))
            .unwrap_or_default()
    })
}

/// Like [`with_session`], but rejects with `Unauthorized` unless the
/// session is logged in.
pub fn require_login(
    signer: Arc<SessionSigner>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_session(signer).and_then(|session: SessionData| async move {
        if session.logged_in {
            Ok(session)
        } else {
            Err(warp::reject::custom(WebError::Unauthorized))
        }
    })
}
