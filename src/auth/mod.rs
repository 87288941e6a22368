//! Authentication
//!
//! Password hashing, the session state machine, and the signup/login/logout
//! service built on the credential store. Session state is an explicit object
//! handed through the auth operations rather than hidden process-wide state,
//! so its lifecycle is visible at every call site:
//!
//! `Anonymous` -> (login) -> `Authenticated(username)` -> (logout) -> `Anonymous`

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::store::CredentialStore;

/// Hash a plaintext password to a fixed-length hex digest.
///
/// Deterministic and one-way. The algorithm (sha256) only matters for
/// compatibility with previously stored digests.
pub fn hash_password(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex::encode(hasher.finalize())
}

/// Authentication state of one interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Not logged in.
    Anonymous,
    /// Logged in as the named user.
    Authenticated(String),
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "ANONYMOUS"),
            Self::Authenticated(user) => write!(f, "AUTHENTICATED({})", user),
        }
    }
}

/// Ephemeral session for one interactive visit.
///
/// Initialized anonymous, never persisted across process restarts.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// A fresh anonymous session.
    pub fn anonymous() -> Self {
        Self {
            state: SessionState::Anonymous,
            created_at: Utc::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    /// The username owning this session, if authenticated.
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            SessionState::Anonymous => None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn authenticate(&mut self, username: &str) {
        self.state = SessionState::Authenticated(username.to_string());
    }

    fn clear(&mut self) {
        self.state = SessionState::Anonymous;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Signup and login over the credential store.
pub struct AuthService {
    store: Mutex<CredentialStore>,
}

impl AuthService {
    pub fn new(store: CredentialStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Create an account.
    ///
    /// Rejects empty fields before touching the store. On success the caller
    /// still has to log in; signup never authenticates a session.
    pub fn signup(&self, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::EmptyFields);
        }
        let digest = hash_password(password);
        let store = self.store.lock().unwrap_or_else(|p| p.into_inner());
        store.insert_user(username, &digest)?;
        tracing::info!(username, "account created");
        Ok(())
    }

    /// Log a session in.
    ///
    /// On success the session transitions to `Authenticated(username)`. On
    /// failure the session is untouched and the error does not reveal whether
    /// the username or the password was wrong.
    pub fn login(&self, session: &mut Session, username: &str, password: &str) -> Result<()> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::EmptyFields);
        }
        let digest = hash_password(password);
        let found = {
            let store = self.store.lock().unwrap_or_else(|p| p.into_inner());
            store.find_user(username, &digest)?
        };
        match found {
            Some(record) => {
                session.authenticate(&record.username);
                tracing::info!(username, "login succeeded");
                Ok(())
            }
            None => {
                tracing::warn!(username, "login failed");
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Log a session out, clearing the stored username. Always succeeds.
    pub fn logout(&self, session: &mut Session) {
        if let Some(user) = session.username() {
            tracing::info!(username = user, "logged out");
        }
        session.clear();
    }
}

/// In-memory map from bearer token to session.
///
/// Tokens are random 32-hex identifiers. Sessions live only as long as the
/// process; there is no persistence and no expiry beyond explicit logout.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an authenticated session and hand back its token.
    pub fn create(&self, session: Session) -> String {
        let token = generate_token();
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.insert(token.clone(), session);
        token
    }

    /// Fetch the session for a token, if one exists.
    pub fn get(&self, token: &str) -> Option<Session> {
        let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
        sessions.get(token).cloned()
    }

    /// Remove the session for a token, returning it for final logout handling.
    pub fn remove(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().unwrap_or_else(|p| p.into_inner());
        sessions.remove(token)
    }

    pub fn len(&self) -> usize {
        let sessions = self.sessions.read().unwrap_or_else(|p| p.into_inner());
        sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Generate a random 32-hex session token.
fn generate_token() -> String {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(CredentialStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_password("hunter2"), hash_password("hunter2"));
    }

    #[test]
    fn test_hash_has_no_collisions_in_test_corpus() {
        let corpus = ["a", "b", "password", "Password", "password ", "pässword"];
        for (i, p1) in corpus.iter().enumerate() {
            for p2 in corpus.iter().skip(i + 1) {
                assert_ne!(hash_password(p1), hash_password(p2));
            }
        }
    }

    #[test]
    fn test_hash_is_fixed_length_hex() {
        let digest = hash_password("hunter2");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signup_then_login() {
        let auth = service();
        auth.signup("alice", "hunter2").unwrap();

        let mut session = Session::anonymous();
        assert!(!session.is_authenticated());

        auth.login(&mut session, "alice", "hunter2").unwrap();
        assert_eq!(
            session.state(),
            &SessionState::Authenticated("alice".to_string())
        );
        assert_eq!(session.username(), Some("alice"));
    }

    #[test]
    fn test_signup_does_not_authenticate() {
        let auth = service();
        auth.signup("alice", "hunter2").unwrap();

        let session = Session::anonymous();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_duplicate_signup() {
        let auth = service();
        auth.signup("alice", "hunter2").unwrap();
        let err = auth.signup("alice", "other").unwrap_err();
        assert!(matches!(err, Error::DuplicateUser));

        // Original credentials still work.
        let mut session = Session::anonymous();
        auth.login(&mut session, "alice", "hunter2").unwrap();
    }

    #[test]
    fn test_login_wrong_password() {
        let auth = service();
        auth.signup("alice", "hunter2").unwrap();

        let mut session = Session::anonymous();
        let err = auth.login(&mut session, "alice", "wrong").unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_login_unknown_user_same_error_as_wrong_password() {
        let auth = service();
        auth.signup("alice", "hunter2").unwrap();

        let mut session = Session::anonymous();
        let unknown = auth
            .login(&mut session, "bob", "hunter2")
            .unwrap_err()
            .to_string();
        let wrong = auth
            .login(&mut session, "alice", "nope")
            .unwrap_err()
            .to_string();
        // No leak about which field failed.
        assert_eq!(unknown, wrong);
    }

    #[test]
    fn test_empty_fields_rejected_before_store() {
        let auth = service();
        assert!(matches!(auth.signup("", "x").unwrap_err(), Error::EmptyFields));
        assert!(matches!(auth.signup("x", "").unwrap_err(), Error::EmptyFields));

        let mut session = Session::anonymous();
        assert!(matches!(
            auth.login(&mut session, "", "x").unwrap_err(),
            Error::EmptyFields
        ));
        assert!(matches!(
            auth.login(&mut session, "x", "").unwrap_err(),
            Error::EmptyFields
        ));
    }

    #[test]
    fn test_logout_clears_session() {
        let auth = service();
        auth.signup("alice", "hunter2").unwrap();

        let mut session = Session::anonymous();
        auth.login(&mut session, "alice", "hunter2").unwrap();
        auth.logout(&mut session);
        assert_eq!(session.state(), &SessionState::Anonymous);
        assert_eq!(session.username(), None);

        // Logout of an anonymous session is a no-op.
        auth.logout(&mut session);
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_session_manager_roundtrip() {
        let manager = SessionManager::new();
        let mut session = Session::anonymous();
        session.authenticate("alice");

        let token = manager.create(session);
        assert_eq!(token.len(), 32);

        let fetched = manager.get(&token).unwrap();
        assert_eq!(fetched.username(), Some("alice"));

        manager.remove(&token);
        assert!(manager.get(&token).is_none());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_tokens_are_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }
}
