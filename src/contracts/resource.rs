//! Generic CRUD contract for one resource collection.

use serde_json::{Map, Value};

use crate::assertions::Expect;
use crate::client::{ApiResponse, ContractClient};
use crate::errors::{HarnessError, Result};
use crate::fixtures::{Fixture, ResourceDescriptor, ResourceKind};

/// Drives the documented CRUD contract of one collection:
///
/// | Operation | Request | Success | Failure |
/// |---|---|---|---|
/// | list | `GET /{resource}` | 200, JSON | 405 on `DELETE /{resource}` |
/// | create | `POST /{resource}` | 201, JSON | 400 on invalid fields |
/// | fetch | `GET /{resource}/{id}` | 200, JSON | 404 unknown id |
/// | update | `PUT /{resource}/{id}` | 200, JSON | 400 on invalid fields |
/// | delete | `DELETE /{resource}/{id}` | 200 | 404 unknown id |
pub struct ResourceContractRunner {
    client: ContractClient,
    descriptor: &'static ResourceDescriptor,
}

impl ResourceContractRunner {
    pub fn new(client: ContractClient, resource: ResourceKind) -> Self {
        Self {
            client,
            descriptor: resource.descriptor(),
        }
    }

    pub fn descriptor(&self) -> &'static ResourceDescriptor {
        self.descriptor
    }

    fn collection(&self) -> String {
        format!("/{}", self.descriptor.path())
    }

    fn item(&self, id: i64) -> String {
        format!("/{}/{}", self.descriptor.path(), id)
    }

    fn require(&self, fixture: &Fixture, valid: bool, operation: &str) -> Result<()> {
        if fixture.resource != self.descriptor.kind || fixture.is_valid() != valid {
            return Err(HarnessError::Internal(format!(
                "{} on /{} cannot use a {:?} {} fixture",
                operation,
                self.descriptor.path(),
                fixture.validity,
                fixture.resource
            )));
        }
        Ok(())
    }

    /// POST a valid fixture; expects 201 + JSON and returns the assigned id.
    pub async fn create(&self, fixture: &Fixture) -> Result<i64> {
        self.require(fixture, true, "create")?;
        let resp = self
            .client
            .post_json(&self.collection(), fixture.body())
            .await?;
        let id = Expect::that(&resp)
            .status(201)?
            .json()?
            .extract_i64("id")?;
        Ok(id)
    }

    /// POST an invalid fixture; expects 400 + JSON.
    pub async fn create_rejected(&self, fixture: &Fixture) -> Result<()> {
        self.require(fixture, false, "create_rejected")?;
        let resp = self
            .client
            .post_json(&self.collection(), fixture.body())
            .await?;
        Expect::that(&resp).status(400)?.json()?;
        Ok(())
    }

    async fn get_existing(&self, id: i64) -> Result<ApiResponse> {
        let resp = self.client.get(&self.item(id)).await?;
        Expect::that(&resp).status(200)?.json()?;
        Ok(resp)
    }

    /// GET an existing resource; expects 200 + a JSON object, returned as
    /// the stored fields (`id` included).
    pub async fn fetch(&self, id: i64) -> Result<Map<String, Value>> {
        let resp = self.get_existing(id).await?;
        Ok(Expect::that(&resp).extract_object("$")?)
    }

    /// GET and compare every echoed field with `fixture`.
    pub async fn fetch_matches(&self, id: i64, fixture: &Fixture) -> Result<ApiResponse> {
        let resp = self.get_existing(id).await?;
        for (field, value) in fixture.echoed_fields() {
            Expect::that(&resp).field_eq(field, value)?;
        }
        Ok(resp)
    }

    /// GET an id that does not exist; expects 404.
    pub async fn fetch_missing(&self, id: i64) -> Result<()> {
        let resp = self.client.get(&self.item(id)).await?;
        Expect::that(&resp).status(404)?;
        Ok(())
    }

    /// PUT a valid fixture; expects 200 + JSON.
    pub async fn update(&self, id: i64, fixture: &Fixture) -> Result<()> {
        self.require(fixture, true, "update")?;
        let resp = self.client.put_json(&self.item(id), fixture.body()).await?;
        Expect::that(&resp).status(200)?.json()?;
        Ok(())
    }

    /// PUT an invalid fixture; expects 400 + JSON, then re-fetches to confirm
    /// the stored resource still matches `stored`.
    pub async fn update_rejected(&self, id: i64, fixture: &Fixture, stored: &Fixture) -> Result<()> {
        self.require(fixture, false, "update_rejected")?;
        let resp = self.client.put_json(&self.item(id), fixture.body()).await?;
        Expect::that(&resp).status(400)?.json()?;
        self.fetch_matches(id, stored).await?;
        Ok(())
    }

    /// DELETE an existing resource; expects 200.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let resp = self.client.delete(&self.item(id)).await?;
        Expect::that(&resp).status(200)?;
        Ok(())
    }

    /// DELETE an id that does not exist (or no longer exists); expects 404.
    pub async fn delete_missing(&self, id: i64) -> Result<()> {
        let resp = self.client.delete(&self.item(id)).await?;
        Expect::that(&resp).status(404)?;
        Ok(())
    }

    /// GET the collection; expects 200 + JSON. Returns the number of entries
    /// when the body is an array.
    pub async fn list(&self) -> Result<Option<usize>> {
        let resp = self.client.get(&self.collection()).await?;
        Expect::that(&resp).status(200)?.json()?;
        Ok(resp.json().and_then(Value::as_array).map(Vec::len))
    }

    /// DELETE on the collection itself; expects 405.
    pub async fn unsupported_verb(&self) -> Result<()> {
        let resp = self.client.delete(&self.collection()).await?;
        Expect::that(&resp).status(405)?;
        Ok(())
    }

    /// GET a path that only shares a prefix with the collection; expects 404.
    pub async fn invalid_path(&self) -> Result<()> {
        let path = format!("/{}invalidpath", self.descriptor.path());
        let resp = self.client.get(&path).await?;
        Expect::that(&resp).status(404)?;
        Ok(())
    }
}
