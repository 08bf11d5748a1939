// Copyright 2026 Boundless Foundation, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Content-addressed stores for Merkle artifacts.
//!
//! The primary store is IPFS via Pinata and returns the CID of the pinned file. The
//! secondary mirror is a plain HTTP endpoint that accepts the same JSON body.

use std::{
    env::{self, VarError},
    error::Error as StdError,
};

use anyhow::anyhow;
use async_trait::async_trait;
use auto_impl::auto_impl;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use url::Url;

const DEFAULT_PINATA_API_URL: &str = "https://uploads.pinata.cloud";

/// Errors from content store uploads.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn StdError + Send + Sync + 'static>),

    /// Environment variable error.
    #[error("environment variable error: {0}")]
    EnvVar(#[from] VarError),

    /// Missing configuration parameter.
    #[error("missing config parameter: {0}")]
    MissingConfig(&'static str),

    /// Other error.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl StorageError {
    /// Create an HTTP error from a reqwest error.
    pub fn http(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self::Http(err.into())
    }

    /// True for transport failures, 5xx and 429 responses. Client errors, malformed
    /// responses and configuration problems are permanent.
    pub fn is_transient(&self) -> bool {
        let Self::Http(err) = self else {
            return false;
        };
        match err.downcast_ref::<reqwest::Error>() {
            Some(err) if err.is_decode() => false,
            Some(err) => match err.status() {
                Some(status) => {
                    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
                }
                None => true,
            },
            None => true,
        }
    }
}

/// A store that accepts a named blob and returns an identifier for it.
#[async_trait]
#[auto_impl(&, Arc)]
pub trait ContentStore: Send + Sync {
    /// Uploads `content` under `name`, returning the identifier the store assigns to it.
    async fn upload(&self, name: &str, content: &[u8]) -> Result<String, StorageError>;
}

/// Pins content to IPFS through Pinata and returns the CID.
#[derive(Clone, Debug)]
pub struct PinataStore {
    client: Client,
    pinata_jwt: String,
    pinata_api_url: Url,
}

impl PinataStore {
    /// Creates a new Pinata store with explicit parameters.
    pub fn new(jwt: String, api_url: Url) -> Self {
        Self { client: Client::new(), pinata_jwt: jwt, pinata_api_url: api_url }
    }

    /// Creates a new Pinata store from `PINATA_JWT` and optional `PINATA_API_URL`.
    pub fn from_env() -> Result<Self, StorageError> {
        let jwt = env::var("PINATA_JWT")?;
        if jwt.is_empty() {
            return Err(StorageError::Other(anyhow!("PINATA_JWT must be non-empty")));
        }

        let api_url_str = match env::var("PINATA_API_URL") {
            Ok(url) => url,
            Err(VarError::NotPresent) => DEFAULT_PINATA_API_URL.to_string(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::new(jwt, Url::parse(&api_url_str)?))
    }

    /// Default Pinata upload endpoint.
    pub fn default_api_url() -> Result<Url, StorageError> {
        Ok(Url::parse(DEFAULT_PINATA_API_URL)?)
    }
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn upload(&self, name: &str, content: &[u8]) -> Result<String, StorageError> {
        let url = self.pinata_api_url.join("/v3/files")?;

        let form = Form::new()
            .part(
                "file",
                Part::bytes(content.to_vec())
                    .mime_str("application/json")
                    .map_err(StorageError::http)?
                    .file_name(name.to_string()),
            )
            .part("network", Part::text("public"));

        let request = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.pinata_jwt))
            .multipart(form)
            .build()
            .map_err(StorageError::http)?;

        tracing::debug!("Sending Pinata upload request: {}", request.url());

        let response = self.client.execute(request).await.map_err(StorageError::http)?;

        tracing::debug!("Pinata response status: {}", response.status());

        let response = response.error_for_status().map_err(StorageError::http)?;

        let json_value: serde_json::Value = response.json().await.map_err(StorageError::http)?;

        let cid = json_value
            .as_object()
            .ok_or_else(|| StorageError::Other(anyhow!("response is not a JSON object")))?
            .get("data")
            .ok_or_else(|| StorageError::Other(anyhow!("response missing 'data' field")))?
            .get("cid")
            .ok_or_else(|| StorageError::Other(anyhow!("response missing 'data.cid' field")))?
            .as_str()
            .ok_or_else(|| StorageError::Other(anyhow!("invalid IPFS hash type")))?;

        Ok(cid.to_string())
    }
}

/// Best-effort secondary index: POSTs the JSON body and returns the response text.
#[derive(Clone, Debug)]
pub struct HttpMirror {
    client: Client,
    url: Url,
}

impl HttpMirror {
    pub fn new(url: Url) -> Self {
        Self { client: Client::new(), url }
    }
}

#[async_trait]
impl ContentStore for HttpMirror {
    async fn upload(&self, name: &str, content: &[u8]) -> Result<String, StorageError> {
        let response = self
            .client
            .post(self.url.clone())
            .header("content-type", "application/json")
            .header("x-artifact-name", name)
            .body(content.to_vec())
            .send()
            .await
            .map_err(StorageError::http)?
            .error_for_status()
            .map_err(StorageError::http)?;
        response.text().await.map_err(StorageError::http)
    }
}
