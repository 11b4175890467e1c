//! JSON-over-HTTP document store client.
//!
//! Routes, relative to the configured endpoint:
//!
//! ```text
//! POST   /v1/{collection}          create, answers {"id": ...}
//! PUT    /v1/{collection}/{id}     merge-update
//! GET    /v1/{collection}?owner=   list
//! DELETE /v1/{collection}/{id}
//! ```
//!
//! Transport failures and 5xx answers are `Unavailable`; any other
//! non-success status is `Rejected`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

use super::{DocumentStore, OWNER_FIELD};
use crate::error::RemoteError;

/// Base URL, credentials and HTTP client shared by the remote clients.
#[derive(Debug, Clone)]
pub struct Endpoint {
    client: Client,
    base: Url,
    api_key: Option<String>,
}

impl Endpoint {
    /// # Errors
    /// Fails on an unparsable endpoint or if the HTTP client cannot be
    /// constructed.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let base = Url::parse(endpoint)
            .map_err(|e| RemoteError::Unavailable(format!("invalid endpoint '{endpoint}': {e}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base,
            api_key,
        })
    }

    /// `{base}/v1/{segments...}`, each segment percent-encoded.
    pub fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Unavailable(format!("endpoint cannot be a base: {}", self.base)))?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Send with credentials attached and map non-success statuses.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, RemoteError> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            Err(RemoteError::Unavailable(format!("HTTP {status}: {message}")))
        } else {
            Err(RemoteError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

pub struct HttpDocumentStore {
    endpoint: Endpoint,
}

impl HttpDocumentStore {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Convenience constructor from raw settings.
    pub fn connect(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, RemoteError> {
        Ok(Self::new(Endpoint::new(endpoint, api_key, timeout)?))
    }
}

fn stamp(record: Value, id: Option<&str>, owner: Option<&str>) -> Result<Value, RemoteError> {
    let Value::Object(mut fields) = record else {
        return Err(RemoteError::Rejected {
            status: 400,
            message: "record must be a JSON object".into(),
        });
    };
    if let Some(id) = id {
        fields.insert("id".into(), Value::String(id.to_string()));
    }
    if let Some(owner) = owner {
        fields.insert(OWNER_FIELD.into(), Value::String(owner.to_string()));
    }
    Ok(Value::Object(fields))
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn save(
        &self,
        collection: &str,
        id: Option<&str>,
        owner: Option<&str>,
        record: Value,
    ) -> Result<String, RemoteError> {
        let body = stamp(record, id, owner)?;
        match id {
            Some(id) => {
                let url = self.endpoint.url(&[collection, id])?;
                let request = self.endpoint.client().put(url).json(&body);
                self.endpoint.send(request).await?;
                Ok(id.to_string())
            }
            None => {
                let url = self.endpoint.url(&[collection])?;
                let request = self.endpoint.client().post(url).json(&body);
                let created: Value = self
                    .endpoint
                    .send(request)
                    .await?
                    .json()
                    .await
                    .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
                created["id"]
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| RemoteError::Rejected {
                        status: 200,
                        message: "create response carried no id".into(),
                    })
            }
        }
    }

    async fn query(&self, collection: &str, owner: Option<&str>) -> Result<Vec<Value>, RemoteError> {
        let url = self.endpoint.url(&[collection])?;
        let mut request = self.endpoint.client().get(url);
        if let Some(owner) = owner {
            request = request.query(&[("owner", owner)]);
        }
        let body: Value = self
            .endpoint
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        match body {
            Value::Array(items) => Ok(items),
            Value::Object(mut obj) => match obj.remove("documents") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(RemoteError::Rejected {
                    status: 200,
                    message: "unexpected query response shape".into(),
                }),
            },
            _ => Err(RemoteError::Rejected {
                status: 200,
                message: "unexpected query response shape".into(),
            }),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let url = self.endpoint.url(&[collection, id])?;
        let request = self.endpoint.client().delete(url);
        match self.endpoint.send(request).await {
            Ok(_) => Ok(()),
            // Already gone.
            Err(RemoteError::Rejected { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
