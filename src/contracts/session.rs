//! Session Lifecycle Verifier
//!
//! Tracks one session bound to one student and drives it through
//!
//! ```text
//! NoSession --login(ok)--> Active --logout--> Expired (terminal)
//!     |
//!     +--login(wrong password)--> NoSession
//! ```
//!
//! asserting the service's answer at every step. Calling an operation the
//! local state does not allow is a harness bug and fails with
//! [`HarnessError::Internal`] before any request is sent.

use serde_json::json;

use crate::assertions::Expect;
use crate::client::ContractClient;
use crate::errors::{ContractViolation, HarnessError, Result};
use crate::fixtures::generator::SESSION_ID_LEN;
use crate::observability::telemetry::record_session_transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    Active,
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::NoSession => write!(f, "NoSession"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Expired => write!(f, "Expired"),
        }
    }
}

pub struct SessionLifecycleVerifier {
    client: ContractClient,
    student_id: i64,
    state: SessionState,
    session: Option<String>,
}

impl SessionLifecycleVerifier {
    pub fn new(client: ContractClient, student_id: i64) -> Self {
        Self {
            client,
            student_id,
            state: SessionState::NoSession,
            session: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identifier issued by the last successful login
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref()
    }

    fn path(&self, action: &str) -> String {
        format!("/alumnos/{}/session/{}", self.student_id, action)
    }

    fn require(&self, expected: SessionState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(HarnessError::Internal(format!(
                "session {} called in state {} (needs {})",
                operation, self.state, expected
            )));
        }
        Ok(())
    }

    fn transition(&mut self, to: SessionState) {
        record_session_transition(self.student_id, &self.state.to_string(), &to.to_string());
        self.state = to;
    }

    fn current(&self) -> Result<&str> {
        self.session
            .as_deref()
            .ok_or_else(|| HarnessError::Internal("no session identifier recorded".to_string()))
    }

    /// Correct password: 200 + JSON with a 128-character `sessionString`.
    pub async fn login(&mut self, password: &str) -> Result<String> {
        self.require(SessionState::NoSession, "login")?;
        let resp = self
            .client
            .post_json(&self.path("login"), json!({ "password": password }))
            .await?;
        let session = Expect::that(&resp)
            .status(200)?
            .json()?
            .field_len("sessionString", SESSION_ID_LEN)?
            .extract_str("sessionString")?;
        self.session = Some(session.clone());
        self.transition(SessionState::Active);
        Ok(session)
    }

    /// Wrong password: 400 and no session; the state stays `NoSession`.
    pub async fn login_rejected(&mut self, wrong_password: &str) -> Result<()> {
        self.require(SessionState::NoSession, "login_rejected")?;
        let resp = self
            .client
            .post_json(&self.path("login"), json!({ "password": wrong_password }))
            .await?;
        Expect::that(&resp).status(400)?;
        Ok(())
    }

    /// Active session: 200 + JSON.
    pub async fn verify(&self) -> Result<()> {
        self.require(SessionState::Active, "verify")?;
        let session = self.current()?;
        let resp = self
            .client
            .post_json(&self.path("verify"), json!({ "sessionString": session }))
            .await?;
        Expect::that(&resp).status(200)?.json()?;
        Ok(())
    }

    /// Active session: 200 + JSON, then `Expired`.
    pub async fn logout(&mut self) -> Result<()> {
        self.require(SessionState::Active, "logout")?;
        let session = self.current()?.to_string();
        let resp = self
            .client
            .post_json(&self.path("logout"), json!({ "sessionString": session }))
            .await?;
        Expect::that(&resp).status(200)?.json()?;
        self.transition(SessionState::Expired);
        Ok(())
    }

    /// Expired session: verifying the same identifier again must give 400.
    pub async fn verify_expired(&self) -> Result<()> {
        self.require(SessionState::Expired, "verify_expired")?;
        let session = self.current()?;
        self.expect_rejected(session).await
    }

    /// Any identifier this verifier does not hold (forged, garbled or belonging
    /// to nobody) must give 400 + JSON, whatever the local state.
    pub async fn verify_foreign(&self, session: &str) -> Result<()> {
        if self.session.as_deref() == Some(session) {
            return Err(HarnessError::Internal(
                "verify_foreign called with the verifier's own session".to_string(),
            ));
        }
        self.expect_rejected(session).await
    }

    async fn expect_rejected(&self, session: &str) -> Result<()> {
        let resp = self
            .client
            .post_json(&self.path("verify"), json!({ "sessionString": session }))
            .await?;
        Expect::that(&resp).status(400)?.json()?;
        Ok(())
    }
}

/// Two sessions on the same student must carry different identifiers.
pub fn ensure_distinct(first: &str, second: &str, student_id: i64) -> Result<()> {
    if first == second {
        return Err(ContractViolation {
            request: format!("POST /alumnos/{}/session/login", student_id),
            check: "session-unique".to_string(),
            path: "sessionString".to_string(),
            expected: "identifier not issued before".to_string(),
            actual: "identifier of an earlier session".to_string(),
        }
        .into());
    }
    Ok(())
}
