//! Where the page-access list comes from.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{ACCEPT, AUTHORIZATION};
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tracing::debug;

use crate::auth::Identity;
use crate::config::Access as AccessConfig;
use crate::error::{Error, Result};

/// A fetcher for the raw page-access payload.
///
/// The payload is returned as untyped JSON; shaping it into a
/// [`PageAccessList`](crate::permission::PageAccessList) is the caller's job.
pub trait PageSource: Send + Sync + 'static {
    fn fetch(&self, identity: &Identity) -> impl Future<Output = Result<Value>> + Send;
}

/// A fixed payload, handed out to every identity.
#[derive(Debug, Clone)]
pub struct StaticSource {
    payload: Value,
}

impl StaticSource {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

impl PageSource for StaticSource {
    async fn fetch(&self, _identity: &Identity) -> Result<Value> {
        Ok(self.payload.clone())
    }
}

/// GETs the page-access endpoint with the identity's bearer token.
pub struct HttpSource {
    endpoint: hyper::Uri,
    timeout: Duration,
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HttpSource {
    pub fn new(config: &AccessConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .parse::<hyper::Uri>()
            .map_err(|e| Error::Config(format!("Invalid access endpoint: {e}")))?;

        Ok(Self {
            endpoint,
            timeout: Duration::from_secs(config.request_timeout_secs),
            client: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    async fn get(&self, identity: &Identity) -> Result<Value> {
        let mut builder = Request::builder()
            .method(Method::GET)
            .uri(self.endpoint.clone())
            .header(ACCEPT, "application/json");
        if let Some(token) = &identity.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Empty::<Bytes>::new())
            .map_err(|e| Error::Http(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::Http(e.to_string()))?
            .to_bytes();

        debug!(endpoint = %self.endpoint, bytes = body.len(), "Fetched page-access list");
        Ok(serde_json::from_slice(&body)?)
    }
}

impl PageSource for HttpSource {
    async fn fetch(&self, identity: &Identity) -> Result<Value> {
        tokio::time::timeout(self.timeout, self.get(identity))
            .await
            .map_err(|_| Error::Timeout)?
    }
}
