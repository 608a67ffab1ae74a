//! Request dispatch against the YooKassa API.
//!
//! # Design
//! A call runs in three steps. `build_request` turns method, path, body and
//! idempotency key into an `HttpRequest` with every header in place.
//! `execute` performs the single network round-trip with `reqwest`.
//! `parse_response` maps the `HttpResponse` to raw JSON or an `Error`. Only
//! `execute` does I/O, so the other two are covered by plain unit tests.
//!
//! This layer returns `serde_json::Value`; typing happens in the facade.
//! Resource ids are caller data and go through `path_segment` before they
//! are joined into a path.

use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{ApiErrorBody, Error, Result, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub const IDEMPOTENCE_KEY_HEADER: &str = "Idempotence-Key";

fn user_agent() -> String {
    format!("yookassa-core/{}", crate::VERSION)
}

#[derive(Debug, Clone)]
pub(crate) struct Transport {
    config: Config,
    http: reqwest::Client,
}

impl Transport {
    pub(crate) fn new(config: Config) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Build, send and parse one request. Single attempt, no retry.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub(crate) async fn call<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        idempotence_key: Option<&str>,
    ) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, path, body, idempotence_key)?;
        if self.config.debug {
            debug!(
                url = %request.url,
                headers = ?redacted(&request.headers),
                body = request.body.as_deref().unwrap_or(""),
                "sending request"
            );
        }

        let response = self.execute(request).await.inspect_err(|e| {
            debug!(error = %e, "request failed before a response arrived");
        })?;
        if self.config.debug {
            debug!(
                status = response.status,
                headers = ?response.headers,
                body = %response.body,
                "received response"
            );
        }

        parse_response(response).inspect_err(|e| {
            debug!(status = ?e.status(), error = %e, "request failed");
        })
    }

    pub(crate) fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        idempotence_key: Option<&str>,
    ) -> Result<HttpRequest>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}{}", self.config.base_host, self.config.base_path, path);
        reqwest::Url::parse(&url).map_err(|e| TransportError::InvalidUrl {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let mut headers = vec![
            ("Authorization".to_string(), self.basic_auth()),
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), user_agent()),
        ];

        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(TransportError::Encode)?;
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(key) = idempotence_key {
            headers.push((IDEMPOTENCE_KEY_HEADER.to_string(), key.to_string()));
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
            headers.insert(header_name, header_value);
        }

        let mut builder = self
            .http
            .request(request.method.into(), request.url.as_str())
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.config.shop_id, self.config.secret_key);
        format!("Basic {}", STANDARD.encode(credentials))
    }
}

/// Percent-encode a resource id so it stays a single path segment.
/// Empty ids and dot segments would change the resource path and are rejected.
pub(crate) fn path_segment(id: &str) -> Result<Cow<'_, str>> {
    if id.is_empty() || id == "." || id == ".." {
        return Err(TransportError::InvalidResourceId(id.to_string()).into());
    }
    Ok(urlencoding::encode(id))
}

/// Map a response to raw JSON, or to `Error::Api` for non-2xx statuses.
pub(crate) fn parse_response(response: HttpResponse) -> Result<Value> {
    if !response.is_success() {
        let details = serde_json::from_str::<ApiErrorBody>(&response.body).ok();
        return Err(Error::Api {
            status: response.status,
            body: response.body,
            details,
        });
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(&response.body).map_err(|e| TransportError::Decode(e).into())
}

fn redacted(headers: &[(String, String)]) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(k, v)| {
            if k.eq_ignore_ascii_case("authorization") {
                (k.as_str(), "<redacted>")
            } else {
                (k.as_str(), v.as_str())
            }
        })
        .collect()
}
