//! Thin client for the Freesound REST API.
//!
//! Key-scoped calls (search, similar) authenticate with `Token <api key>`,
//! user-scoped calls (profile, sound details, token exchange) with a bearer
//! token. Every failure is mapped to the message the host script displays;
//! nothing is retried.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::error::{GatewayError, GatewayResult};
use crate::query::SearchQuery;

pub const DEFAULT_BASE_URL: &str = "https://freesound.org/apiv2";

/// Fields requested for every sound in list responses.
const LIST_FIELDS: &str = "id,name,previews,username,duration,url,license,tags,num_downloads";
const PAGE_SIZE: u32 = 25;
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FreesoundClient {
    http: reqwest::Client,
    base_url: String,
}

impl FreesoundClient {
    pub fn new() -> GatewayResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|error| {
                GatewayError::Environment(format!("failed to build HTTP client: {error}"))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Text search with an API key.
    pub async fn search(&self, api_key: &str, query: &SearchQuery) -> GatewayResult<Value> {
        let url = format!("{}/search/text/", self.base_url);
        let mut params: Vec<(&str, String)> = vec![
            ("query", query.text.clone()),
            ("fields", LIST_FIELDS.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
            ("page", query.page.to_string()),
        ];
        if !query.sort.is_empty() {
            params.push(("sort", query.sort.clone()));
        }
        if let Some(filter) = query.filter_expression() {
            params.push(("filter", filter));
        }
        self.key_scoped_get(&url, api_key, &params).await
    }

    /// Sounds similar to `sound_id`, with an API key.
    pub async fn similar(&self, api_key: &str, sound_id: &str, page: u32) -> GatewayResult<Value> {
        let url = format!("{}/sounds/{}/similar/", self.base_url, sound_id);
        let params: Vec<(&str, String)> = vec![
            ("fields", LIST_FIELDS.to_string()),
            ("page_size", PAGE_SIZE.to_string()),
            ("page", page.to_string()),
        ];
        self.key_scoped_get(&url, api_key, &params).await
    }

    /// Favorites lookup: one request ORing all ids, response reordered to
    /// match the requested order. An empty id list short-circuits without
    /// touching the network.
    pub async fn favorites_details(&self, api_key: &str, ids_csv: &str) -> GatewayResult<Value> {
        let ids: Vec<String> = ids_csv
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Ok(json!({
                "count": 0,
                "results": [],
                "next": null,
                "previous": null,
            }));
        }

        let id_filter = ids
            .iter()
            .map(|id| format!("id:{id}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let mut query = SearchQuery::new("");
        query.extra_filter = Some(id_filter);

        let payload = self.search(api_key, &query).await?;
        Ok(reorder_by_ids(payload, &ids))
    }

    /// Profile of the authenticated user.
    pub async fn user_info(&self, access_token: &str) -> GatewayResult<Value> {
        let url = format!("{}/me/", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|_| {
                GatewayError::Network("Failed to get user info. Status: N/A".to_string())
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: Some(status.as_u16()),
                message: format!("Failed to get user info. Status: {}", status.as_u16()),
            });
        }
        response.json().await.map_err(|error| {
            GatewayError::Network(format!("failed to parse user info response: {error}"))
        })
    }

    /// Detail lookup for one sound, returning its name, original type and
    /// authenticated download URL.
    pub async fn sound_details(&self, sound_id: &str, access_token: &str) -> GatewayResult<Value> {
        let url = format!("{}/sounds/{}/", self.base_url, sound_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("fields", "name,download,type")])
            .send()
            .await
            .map_err(|_| {
                GatewayError::Network("Failed to get sound details. Status: N/A".to_string())
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Api {
                status: Some(status.as_u16()),
                message: format!("Failed to get sound details. Status: {}", status.as_u16()),
            });
        }
        response.json().await.map_err(|error| {
            GatewayError::Network(format!("failed to parse sound details: {error}"))
        })
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_token(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> GatewayResult<Value> {
        let url = format!("{}/oauth2/access_token/", self.base_url);
        let form = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|error| {
                GatewayError::Network(format!(
                    "Failed to get access token. Status: N/A, Response: {error}"
                ))
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: Some(status.as_u16()),
                message: format!(
                    "Failed to get access token. Status: {}, Response: {body}",
                    status.as_u16()
                ),
            });
        }
        response.json().await.map_err(|error| {
            GatewayError::Network(format!("failed to parse token response: {error}"))
        })
    }

    async fn key_scoped_get(
        &self,
        url: &str,
        api_key: &str,
        params: &[(&str, String)],
    ) -> GatewayResult<Value> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Token {api_key}"))
            .query(params)
            .send()
            .await
            .map_err(|error| GatewayError::Network(format!("API Error N/A: {error}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(key_scoped_error(status, &body));
        }
        response
            .json()
            .await
            .map_err(|error| GatewayError::Network(format!("failed to parse API response: {error}")))
    }
}

/// Map a key-scoped HTTP failure to the message shown by the host, keeping
/// the invalid-key case distinct.
fn key_scoped_error(status: StatusCode, body: &str) -> GatewayError {
    if status == StatusCode::UNAUTHORIZED {
        return GatewayError::Api {
            status: Some(401),
            message: "Invalid API Key. Please check your key.".to_string(),
        };
    }
    GatewayError::Api {
        status: Some(status.as_u16()),
        message: format!("API Error {}: {body}", status.as_u16()),
    }
}

/// Reorder an API result set to match the requested id order.
///
/// Ids missing from the response are dropped and `count` reflects the
/// reordered list. The drop is intentional host-facing behavior, carried
/// over as-is.
fn reorder_by_ids(mut payload: Value, ids: &[String]) -> Value {
    let Some(results) = payload.get("results").and_then(Value::as_array).cloned() else {
        return payload;
    };

    let mut by_id: HashMap<i64, Value> = results
        .into_iter()
        .filter_map(|sound| {
            let id = sound.get("id").and_then(Value::as_i64)?;
            Some((id, sound))
        })
        .collect();
    let sorted: Vec<Value> = ids
        .iter()
        .filter_map(|id| id.parse::<i64>().ok())
        .filter_map(|id| by_id.remove(&id))
        .collect();

    payload["count"] = json!(sorted.len());
    payload["results"] = Value::Array(sorted);
    payload
}
