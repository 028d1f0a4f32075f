use serde_json::json;

use crate::assertions::Expect;
use crate::client::ContractClient;
use crate::errors::Result;

/// `POST /alumnos/{id}/email`: asks the service to send a student's
/// record by email. The mail itself is never observed.
pub struct NotificationContract {
    client: ContractClient,
}

impl NotificationContract {
    pub fn new(client: ContractClient) -> Self {
        Self { client }
    }

    fn path(id: i64) -> String {
        format!("/alumnos/{}/email", id)
    }

    /// Expects 200 + JSON for an existing student.
    pub async fn notify(&self, id: i64) -> Result<()> {
        let resp = self.client.post_json(&Self::path(id), json!({})).await?;
        Expect::that(&resp).status(200)?.json()?;
        Ok(())
    }

    /// Expects 404 for an unknown student.
    pub async fn notify_missing(&self, id: i64) -> Result<()> {
        let resp = self.client.post_json(&Self::path(id), json!({})).await?;
        Expect::that(&resp).status(404)?;
        Ok(())
    }
}
