//!
//! src/fetch.rs  Andrew Belles  Sept 10th, 2025
//!
//! Defines methods for hitting chart and label pages and
//! returning the unparsed html. No retries, one timeout per request
//!

use async_trait::async_trait;
use reqwest::{Client, header, redirect};
use crate::config::{HttpConfig, IdentityConfig};
use crate::CrawlerError;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder  {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, CrawlerError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| CrawlerError::Http(format!("build client: {e}")))
}

pub fn html_client(http: &HttpConfig, id: &IdentityConfig) ->
    Result<Client, CrawlerError> {

    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("text/html"));
    h.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&id.user_agent)
            .map_err(|e| CrawlerError::Config(
                format!("invalid user-agent {e}")
            ))?
    );
    client_with_headers(http, h)
}

/// Anything that can hand back a page body for a url
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError>;
}

#[derive(Clone, Debug)]
pub struct HttpPageFetcher {
    pub http: Client,
}

impl HttpPageFetcher {
    pub fn new(http_config: &HttpConfig, id: &IdentityConfig) ->
        Result<Self, CrawlerError> {
        let http = html_client(http_config, id)?;
        Ok( Self { http } )
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    /// GET {url}, non-2xx is an error
    async fn fetch(&self, url: &str) -> Result<String, CrawlerError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::Http(format!("status {status} for {url}")));
        }
        Ok(response.text().await?)
    }
}
