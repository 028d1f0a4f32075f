//! Scenario catalog
//!
//! Resource scenarios are defined once and instantiated for every resource
//! descriptor; notification, session and upload scenarios exist only for
//! students. Each scenario creates its own fixtures and shares nothing with
//! the others.

use serde::Serialize;
use std::sync::Arc;

use crate::client::ContractClient;
use crate::config::HarnessConfig;
use crate::contracts::session::ensure_distinct;
use crate::contracts::{
    NotificationContract, ResourceContractRunner, SessionLifecycleVerifier, UploadContractVerifier,
};
use crate::errors::{HarnessError, Result};
use crate::fixtures::{FixtureGenerator, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    List,
    UnsupportedVerb,
    InvalidPath,
    Create,
    CreateInvalid,
    FetchRoundTrip,
    FetchMissing,
    Update,
    UpdateInvalid,
    Delete,
    DeleteTwice,
    DeleteMissing,
    Notify,
    NotifyMissing,
    SessionLogin,
    SessionWrongPassword,
    SessionVerify,
    SessionForged,
    SessionLogoutTerminal,
    SessionIndependent,
    UploadProfilePicture,
    UploadRetrievable,
}

const RESOURCE_SCENARIOS: &[(ScenarioKind, &str, &str)] = &[
    (ScenarioKind::List, "list", "GET collection answers 200 + JSON"),
    (ScenarioKind::UnsupportedVerb, "unsupported_verb", "DELETE on the collection answers 405"),
    (ScenarioKind::InvalidPath, "invalid_path", "unknown collection path answers 404"),
    (ScenarioKind::Create, "create", "valid fixture is created with 201 + id"),
    (ScenarioKind::CreateInvalid, "create_invalid", "invalid fixture is rejected with 400"),
    (ScenarioKind::FetchRoundTrip, "fetch", "created resource reads back with the submitted fields"),
    (ScenarioKind::FetchMissing, "fetch_missing", "unknown id answers 404"),
    (ScenarioKind::Update, "update", "valid update is applied and reads back"),
    (ScenarioKind::UpdateInvalid, "update_invalid", "invalid update answers 400 and leaves the resource unchanged"),
    (ScenarioKind::Delete, "delete", "deleted resource answers 404 afterwards"),
    (ScenarioKind::DeleteTwice, "delete_twice", "second delete of the same id answers 404"),
    (ScenarioKind::DeleteMissing, "delete_missing", "delete of an unknown id answers 404"),
];

const STUDENT_SCENARIOS: &[(ScenarioKind, &str, &str)] = &[
    (ScenarioKind::Notify, "notify.send", "email notification for a student answers 200 + JSON"),
    (ScenarioKind::NotifyMissing, "notify.missing", "email notification for an unknown student answers 404"),
    (ScenarioKind::SessionLogin, "session.login", "correct password issues a 128-character session"),
    (ScenarioKind::SessionWrongPassword, "session.wrong_password", "wrong password answers 400 without a session"),
    (ScenarioKind::SessionVerify, "session.verify", "active session verifies with 200"),
    (ScenarioKind::SessionForged, "session.forged", "forged and garbled identifiers never verify"),
    (ScenarioKind::SessionLogoutTerminal, "session.logout_terminal", "verify after logout answers 400"),
    (ScenarioKind::SessionIndependent, "session.independent", "two sessions are distinct and expire independently"),
    (ScenarioKind::UploadProfilePicture, "upload.profile_picture", "upload returns a storage URL that is retrievable and linked"),
    (ScenarioKind::UploadRetrievable, "upload.retrievable", "uploaded object answers HEAD with success"),
];

/// Fields violated by the invalid-create scenario
pub fn create_violations(resource: ResourceKind) -> &'static [&'static str] {
    match resource {
        ResourceKind::Student => &["nombres", "apellidos", "matricula", "promedio"],
        ResourceKind::Teacher => &["numeroEmpleado", "horasClase"],
    }
}

/// Fields violated by the invalid-update scenario
pub fn update_violations(resource: ResourceKind) -> &'static [&'static str] {
    match resource {
        ResourceKind::Student => &["nombres", "matricula"],
        ResourceKind::Teacher => &["nombres", "horasClase"],
    }
}

/// Everything one scenario needs; built fresh per scenario.
pub struct ScenarioContext {
    pub client: ContractClient,
    pub gen: FixtureGenerator,
    pub config: Arc<HarnessConfig>,
    pub upload_image: Arc<(String, Vec<u8>)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Scenario {
    pub name: String,
    pub resource: ResourceKind,
    pub kind: ScenarioKind,
    pub description: &'static str,
}

impl Scenario {
    /// Group shown in listings: the part of the name before the first dot.
    pub fn group(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    pub async fn execute(&self, ctx: &mut ScenarioContext) -> Result<()> {
        match self.kind {
            ScenarioKind::List
            | ScenarioKind::UnsupportedVerb
            | ScenarioKind::InvalidPath
            | ScenarioKind::Create
            | ScenarioKind::CreateInvalid
            | ScenarioKind::FetchRoundTrip
            | ScenarioKind::FetchMissing
            | ScenarioKind::Update
            | ScenarioKind::UpdateInvalid
            | ScenarioKind::Delete
            | ScenarioKind::DeleteTwice
            | ScenarioKind::DeleteMissing => self.execute_resource(ctx).await,
            ScenarioKind::Notify | ScenarioKind::NotifyMissing => self.execute_notify(ctx).await,
            ScenarioKind::SessionLogin
            | ScenarioKind::SessionWrongPassword
            | ScenarioKind::SessionVerify
            | ScenarioKind::SessionForged
            | ScenarioKind::SessionLogoutTerminal
            | ScenarioKind::SessionIndependent => self.execute_session(ctx).await,
            ScenarioKind::UploadProfilePicture | ScenarioKind::UploadRetrievable => {
                self.execute_upload(ctx).await
            }
        }
    }

    async fn execute_resource(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let runner = ResourceContractRunner::new(ctx.client.clone(), self.resource);
        match self.kind {
            ScenarioKind::List => {
                runner.list().await?;
            }
            ScenarioKind::UnsupportedVerb => runner.unsupported_verb().await?,
            ScenarioKind::InvalidPath => runner.invalid_path().await?,
            ScenarioKind::Create => {
                let fixture = ctx.gen.valid(self.resource)?;
                runner.create(&fixture).await?;
            }
            ScenarioKind::CreateInvalid => {
                let fixture = ctx
                    .gen
                    .invalid(self.resource, create_violations(self.resource))?;
                runner.create_rejected(&fixture).await?;
            }
            ScenarioKind::FetchRoundTrip => {
                let fixture = ctx.gen.valid(self.resource)?;
                let id = runner.create(&fixture).await?;
                runner.fetch_matches(id, &fixture).await?;
            }
            ScenarioKind::FetchMissing => {
                runner.fetch_missing(ctx.gen.absent_id()).await?;
            }
            ScenarioKind::Update => {
                let fixture = ctx.gen.valid(self.resource)?;
                let id = runner.create(&fixture).await?;
                runner.fetch_matches(id, &fixture).await?;
                let revised = ctx.gen.revise(&fixture)?;
                runner.update(id, &revised).await?;
                runner.fetch_matches(id, &revised).await?;
            }
            ScenarioKind::UpdateInvalid => {
                let fixture = ctx.gen.valid(self.resource)?;
                let id = runner.create(&fixture).await?;
                runner.fetch_matches(id, &fixture).await?;
                let invalid = ctx
                    .gen
                    .corrupt(&fixture, update_violations(self.resource))?;
                runner.update_rejected(id, &invalid, &fixture).await?;
            }
            ScenarioKind::Delete => {
                let fixture = ctx.gen.valid(self.resource)?;
                let id = runner.create(&fixture).await?;
                runner.fetch(id).await?;
                runner.delete(id).await?;
                runner.fetch_missing(id).await?;
            }
            ScenarioKind::DeleteTwice => {
                let fixture = ctx.gen.valid(self.resource)?;
                let id = runner.create(&fixture).await?;
                runner.delete(id).await?;
                runner.delete_missing(id).await?;
            }
            ScenarioKind::DeleteMissing => {
                runner.delete_missing(ctx.gen.absent_id()).await?;
            }
            _ => return Err(self.misrouted()),
        }
        Ok(())
    }

    async fn execute_notify(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let notify = NotificationContract::new(ctx.client.clone());
        match self.kind {
            ScenarioKind::Notify => {
                let id = create_student(ctx).await?.0;
                notify.notify(id).await
            }
            ScenarioKind::NotifyMissing => notify.notify_missing(ctx.gen.absent_id()).await,
            _ => Err(self.misrouted()),
        }
    }

    async fn execute_session(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let (id, password) = create_student(ctx).await?;
        let mut session = SessionLifecycleVerifier::new(ctx.client.clone(), id);
        match self.kind {
            ScenarioKind::SessionLogin => {
                session.login(&password).await?;
            }
            ScenarioKind::SessionWrongPassword => {
                session.login_rejected(&format!("{}abc", password)).await?;
            }
            ScenarioKind::SessionVerify => {
                session.login(&password).await?;
                session.verify().await?;
            }
            ScenarioKind::SessionForged => {
                let issued = session.login(&password).await?;
                for _ in 0..ctx.config.run.forged_session_probes {
                    let forged = ctx.gen.forged_session();
                    if forged != issued {
                        session.verify_foreign(&forged).await?;
                    }
                }
                session.verify_foreign(&garble(&issued)).await?;
                session.verify().await?;
            }
            ScenarioKind::SessionLogoutTerminal => {
                session.login(&password).await?;
                session.verify().await?;
                session.logout().await?;
                session.verify_expired().await?;
            }
            ScenarioKind::SessionIndependent => {
                let mut second = SessionLifecycleVerifier::new(ctx.client.clone(), id);
                let first_id = session.login(&password).await?;
                let second_id = second.login(&password).await?;
                ensure_distinct(&first_id, &second_id, id)?;
                session.logout().await?;
                session.verify_expired().await?;
                second.verify().await?;
            }
            _ => return Err(self.misrouted()),
        }
        Ok(())
    }

    async fn execute_upload(&self, ctx: &mut ScenarioContext) -> Result<()> {
        let (id, _) = create_student(ctx).await?;
        let upload = UploadContractVerifier::new(
            ctx.client.clone(),
            &ctx.config.target.storage_domain,
        );
        let (file_name, bytes) = ctx.upload_image.as_ref();
        match self.kind {
            ScenarioKind::UploadProfilePicture => {
                upload.verify(id, file_name, bytes.clone()).await?;
            }
            ScenarioKind::UploadRetrievable => {
                let url = upload.upload(id, file_name, bytes.clone()).await?;
                upload.confirm_retrievable(&url).await?;
            }
            _ => return Err(self.misrouted()),
        }
        Ok(())
    }

    fn misrouted(&self) -> HarnessError {
        HarnessError::Internal(format!("scenario {} dispatched to the wrong driver", self.name))
    }
}

/// Create a fresh valid student; returns its id and password.
async fn create_student(ctx: &mut ScenarioContext) -> Result<(i64, String)> {
    let fixture = ctx.gen.valid(ResourceKind::Student)?;
    let password = fixture
        .password()
        .map(str::to_string)
        .ok_or_else(|| HarnessError::Internal("student fixture without password".to_string()))?;
    let runner = ResourceContractRunner::new(ctx.client.clone(), ResourceKind::Student);
    let id = runner.create(&fixture).await?;
    Ok((id, password))
}

/// Same length as `session`, first character changed.
fn garble(session: &str) -> String {
    let mut chars: Vec<char> = session.chars().collect();
    if let Some(first) = chars.first_mut() {
        *first = if *first == 'z' { 'y' } else { 'z' };
    }
    chars.into_iter().collect()
}

/// The full catalog, in a stable order.
pub fn catalog() -> Vec<Scenario> {
    let mut scenarios = Vec::new();
    for resource in ResourceKind::all() {
        for (kind, suffix, description) in RESOURCE_SCENARIOS {
            scenarios.push(Scenario {
                name: format!("{}.{}", resource.label(), suffix),
                resource,
                kind: *kind,
                description: *description,
            });
        }
    }
    for (kind, name, description) in STUDENT_SCENARIOS {
        scenarios.push(Scenario {
            name: name.to_string(),
            resource: ResourceKind::Student,
            kind: *kind,
            description: *description,
        });
    }
    scenarios
}

/// Scenarios whose name contains any of `patterns`; all when `patterns` is empty.
pub fn select(patterns: &[String]) -> Vec<Scenario> {
    catalog()
        .into_iter()
        .filter(|s| patterns.is_empty() || patterns.iter().any(|p| s.name.contains(p.as_str())))
        .collect()
}
