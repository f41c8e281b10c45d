//! Authenticated JSON GETs against one service endpoint

use crate::auth::{AuthSession, Credential};
use crate::catalog::ServiceType;
use gauge_core::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    #[serde(default)]
    rel: Option<String>,
}

/// HTTP client bound to one service's base URL
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    session: Arc<AuthSession>,
    service: ServiceType,
    base_url: Url,
}

impl ServiceClient {
    pub fn new(
        http: Client,
        session: Arc<AuthSession>,
        service: ServiceType,
        endpoint: &str,
    ) -> Result<Self> {
        // A trailing slash makes `join` append rather than replace the last segment.
        let base = format!("{}/", endpoint.trim_end_matches('/'));
        let base_url = Url::parse(&base)
            .map_err(|e| Error::config(format!("Invalid {} endpoint '{}': {}", service, endpoint, e)))?;

        Ok(Self {
            http,
            session,
            service,
            base_url,
        })
    }

    /// Resolve a path relative to the base URL. Absolute URLs are used as-is.
    pub fn url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Url::parse(path).map_err(|e| Error::decode(format!("Invalid URL '{}': {}", path, e)));
        }
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::invalid_request(format!("Invalid path '{}': {}", path, e)))
    }

    /// GET and decode a JSON document
    pub async fn get_json<T: DeserializeOwned + Send>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.session
            .call(|credential| self.get_once(&url, credential))
            .await
    }

    /// GET every page of a collection, following `{key}_links` next links
    pub async fn get_paginated<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let links_key = format!("{}_links", key);
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.url(path)?);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                debug!("Pagination loop detected at {}", url);
                break;
            }

            let page: Value = self.get_json(url.as_str()).await?;
            let entries = page
                .get(key)
                .cloned()
                .ok_or_else(|| Error::decode(format!("Response from {} has no '{}' field", url, key)))?;
            let mut decoded: Vec<T> = serde_json::from_value(entries)
                .map_err(|e| Error::decode(format!("Invalid '{}' in {}: {}", key, url, e)))?;
            items.append(&mut decoded);

            next = match page.get(&links_key) {
                Some(links) => next_link(links)?.map(|href| self.url(&href)).transpose()?,
                None => None,
            };
        }

        Ok(items)
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &Url, credential: Credential) -> Result<T> {
        debug!("GET {} ({})", url, self.service);

        let response = self
            .http
            .get(url.clone())
            .header(AUTH_TOKEN_HEADER, credential.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("GET {} timed out", url))
                } else {
                    Error::transport(format!("GET {} failed: {}", url, e))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::auth_expired(format!("GET {} returned {}", url, status)));
        }
        if !status.is_success() {
            return Err(Error::transport(format!("GET {} returned {}", url, status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response from {}: {}", url, e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("Invalid response from {}: {}", url, e)))
    }
}

fn next_link(links: &Value) -> Result<Option<String>> {
    let links: Vec<Link> = serde_json::from_value(links.clone())
        .map_err(|e| Error::decode(format!("Invalid pagination links: {}", e)))?;
    Ok(links
        .into_iter()
        .find(|link| link.rel.as_deref() == Some("next"))
        .map(|link| link.href))
}
