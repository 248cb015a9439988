//! HTTP remote client for the record server.
//!
//! | call | request |
//! |---|---|
//! | `list` | `GET /api/games?owners=&partialName=&offset=&size=` |
//! | `get` | `GET /api/games/{id}` |
//! | `list_owner_groups` | `GET /api/games/owners` |
//! | `create` | `POST /api/games` |
//! | `update` | `PUT /api/games/{id}` |
//! | `delete` | `DELETE /api/games/{id}` |
//!
//! Every request carries `Authorization: Bearer <token>`.

use crate::config::ClientConfig;
use crate::error::transport_error;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tether_engine::{error::Result, Error, PageQuery, Record, RecordId, RemoteClient};

/// [`RemoteClient`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpRemoteClient {
    /// Create a client for the server at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// Create a client from the loaded configuration.
    pub fn from_config(config: &ClientConfig) -> crate::Result<Self> {
        Self::new(&config.base_url, &config.token, config.timeout)
    }

    pub(crate) fn collection_url(&self) -> String {
        format!("{}/api/games", self.base_url)
    }

    pub(crate) fn record_url(&self, id: RecordId) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    async fn send(&self, request: RequestBuilder, id: Option<RecordId>) -> Result<Response> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response, id).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        id: Option<RecordId>,
    ) -> Result<T> {
        self.send(request, id)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }
}

/// Map a non-2xx response to an engine error.
async fn check_status(response: Response, id: Option<RecordId>) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
        return Err(Error::RecordNotFound(id));
    }
    let message = response.text().await.unwrap_or_default();
    tracing::debug!(status = status.as_u16(), message = %message, "Request rejected");
    Err(Error::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn require_id(record: &Record) -> Result<RecordId> {
    record.id.ok_or_else(|| Error::Rejected {
        status: 400,
        message: format!("record without id: {}", record.name),
    })
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn list(&self, query: &PageQuery) -> Result<Vec<Record>> {
        let request = self.http.get(self.collection_url()).query(&[
            ("owners", query.owner_filter.clone()),
            ("partialName", query.partial_name.clone()),
            ("offset", query.offset.to_string()),
            ("size", query.size.to_string()),
        ]);
        self.send_json(request, None).await
    }

    async fn get(&self, id: RecordId) -> Result<Record> {
        self.send_json(self.http.get(self.record_url(id)), Some(id))
            .await
    }

    async fn list_owner_groups(&self) -> Result<Vec<String>> {
        let url = format!("{}/owners", self.collection_url());
        self.send_json(self.http.get(url), None).await
    }

    async fn create(&self, record: &Record) -> Result<Record> {
        let request = self.http.post(self.collection_url()).json(record);
        self.send_json(request, None).await
    }

    async fn update(&self, record: &Record) -> Result<Record> {
        let id = require_id(record)?;
        let request = self.http.put(self.record_url(id)).json(record);
        self.send_json(request, Some(id)).await
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        let id = require_id(record)?;
        self.send(self.http.delete(self.record_url(id)), Some(id))
            .await?;
        Ok(())
    }
}
