use std::time::Duration;

use async_trait::async_trait;
use hyper::{
    body::Bytes,
    client::HttpConnector,
    header::{ACCEPT, AUTHORIZATION},
    Body, Client, Method, Request, StatusCode,
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};
use urlencoding::encode;

use crate::{
    compute::{auth::Credentials, ComputeInventory},
    error::{ApiError, Error, Result},
    models::{instances::Instance, zones::Zone},
    Config,
};

const BASE_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(32);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PAGE_SIZE: u32 = 500;

#[derive(Debug, Deserialize)]
struct ListPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// Authenticated client for the compute REST API.
///
/// The access token is obtained once when the client is built and reused
/// for every request of the run.
pub struct ComputeClient {
    http: Client<HttpsConnector<HttpConnector>>,
    endpoint: String,
    token: String,
    max_retries: u32,
    backoff: Duration,
}

impl ComputeClient {
    pub async fn connect(config: &Config) -> Result<Self> {
        let token = Credentials::from_config(config).access_token().await?;
        Ok(Self::with_token(config, token))
    }

    pub fn with_token(config: &Config, token: impl Into<String>) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();

        Self {
            http: Client::builder().build(https),
            endpoint: config.api_endpoint.trim_end_matches('/').to_string(),
            token: token.into(),
            max_retries: config.max_retries,
            backoff: BASE_BACKOFF,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn list_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page_url = match &page_token {
                Some(token) => {
                    format!("{url}?maxResults={PAGE_SIZE}&pageToken={}", encode(token))
                }
                None => format!("{url}?maxResults={PAGE_SIZE}"),
            };
            let page: ListPage<T> = self.get_json(&page_url).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        let body = loop {
            match self.get_once(url).await {
                Ok(body) => break body,
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = backoff_delay(self.backoff, attempt);
                    warn!("request to {url} failed ({e}), retrying in {delay:?}");
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(ApiError::Status { status, body, .. })
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
                {
                    return Err(Error::Auth(format!("{url} returned {status}: {body}")));
                }
                Err(e) => return Err(e.into()),
            }
        };

        serde_json::from_slice(&body).map_err(|source| {
            ApiError::Decode {
                url: url.to_string(),
                source,
            }
            .into()
        })
    }

    async fn get_once(&self, url: &str) -> std::result::Result<Bytes, ApiError> {
        debug!("GET {url}");
        let req = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
            .body(Body::empty())?;

        let response = async {
            let res = self.http.request(req).await?;
            let status = res.status();
            let body = hyper::body::to_bytes(res.into_body()).await?;
            Ok::<_, ApiError>((status, body))
        };
        let (status, body) = tokio::time::timeout(REQUEST_TIMEOUT, response)
            .await
            .map_err(|_| ApiError::Timeout {
                url: url.to_string(),
                after: REQUEST_TIMEOUT,
            })??;
        if !status.is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status,
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        Ok(body)
    }
}

/// Doubles `base` per attempt, saturating at [`MAX_BACKOFF`].
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_BACKOFF)
}

#[async_trait]
impl ComputeInventory for ComputeClient {
    async fn list_zones(&self, project: &str) -> Result<Vec<Zone>> {
        let url = format!("{}/projects/{}/zones", self.endpoint, encode(project));
        self.list_all(&url).await
    }

    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<Instance>> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances",
            self.endpoint,
            encode(project),
            encode(zone)
        );
        self.list_all(&url).await
    }
}
