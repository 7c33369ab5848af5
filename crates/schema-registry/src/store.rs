//! Remote schema store.

use crate::error::{Error, Result};
use async_trait::async_trait;
use kafka_types::{Format, SchemaId};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SCHEMA_REGISTRY_CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

/// A schema as returned by `GET /schemas/ids/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredSchema {
    pub schema: String,
    /// Absent for Avro, which is the registry's default type.
    #[serde(rename = "schemaType", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
}

/// Subject a schema is registered under: `{topic}-key` or `{topic}-value`.
pub fn subject_name(topic: &str, is_key: bool) -> String {
    format!("{topic}-{}", if is_key { "key" } else { "value" })
}

/// Versioned schema storage addressed by numeric id.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Fetch the schema registered under `id`.
    async fn get_schema(&self, id: SchemaId) -> Result<RegisteredSchema>;

    /// Register `schema` under `subject` and return its id. Registering a
    /// schema the store already knows returns the existing id.
    async fn register(&self, subject: &str, schema: &str, format: Format) -> Result<SchemaId>;
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
    #[serde(rename = "schemaType")]
    schema_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: u32,
}

/// [`SchemaStore`] backed by a Confluent-compatible schema registry.
#[derive(Debug, Clone)]
pub struct HttpSchemaStore {
    client: Client,
    base_url: String,
    basic_auth: Option<(String, String)>,
}

impl HttpSchemaStore {
    /// `basic_auth_user_info` uses the registry client convention `user:password`.
    pub fn new(url: &str, basic_auth_user_info: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let basic_auth = basic_auth_user_info.map(|info| match info.split_once(':') {
            Some((user, password)) => (user.to_string(), password.to_string()),
            None => (info.to_string(), String::new()),
        });
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            basic_auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.basic_auth {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        }
    }
}

#[async_trait]
impl SchemaStore for HttpSchemaStore {
    async fn get_schema(&self, id: SchemaId) -> Result<RegisteredSchema> {
        let url = format!("{}/schemas/ids/{id}", self.base_url);
        tracing::debug!("Fetching schema {id} from {url}");

        let response = self
            .authorize(self.client.get(&url))
            .header(reqwest::header::ACCEPT, SCHEMA_REGISTRY_CONTENT_TYPE)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SchemaFetch {
                id,
                message: format!("registry returned status {status}: {body}"),
            });
        }

        Ok(response.json::<RegisteredSchema>().await?)
    }

    async fn register(&self, subject: &str, schema: &str, format: Format) -> Result<SchemaId> {
        let schema_type = format.schema_type().ok_or_else(|| Error::SchemaRegistration {
            subject: subject.to_string(),
            message: format!("format {format} has no schema type"),
        })?;
        let url = format!(
            "{}/subjects/{subject}/versions?normalize=true",
            self.base_url
        );
        tracing::debug!("Registering {schema_type} schema under subject {subject}");

        let response = self
            .authorize(self.client.post(&url))
            .header(reqwest::header::ACCEPT, SCHEMA_REGISTRY_CONTENT_TYPE)
            .header(reqwest::header::CONTENT_TYPE, SCHEMA_REGISTRY_CONTENT_TYPE)
            .json(&RegisterRequest {
                schema,
                schema_type,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::SchemaRegistration {
                subject: subject.to_string(),
                message: format!("registry returned status {status}: {body}"),
            });
        }

        let registered = response.json::<RegisterResponse>().await?;
        Ok(SchemaId(registered.id))
    }
}
