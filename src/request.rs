//! Inbound request view
//!
//! The pipeline never touches a framework request directly. Everything an
//! authenticator may read (headers, cookies, query string, form body) is copied
//! into an [`AuthRequest`] once per request.

use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::collections::HashMap;
use thiserror::Error;

/// Request conversion errors
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Failed to read request body: {0}")]
    Body(String),

    #[error("Request body is not valid UTF-8")]
    Utf8,

    #[error("Request body exceeds {0} bytes")]
    TooLarge(usize),
}

/// Largest form body [`AuthRequest::from_hyper`] will read
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Authentication request context
#[derive(Debug, Clone, Default)]
pub struct AuthRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names are stored lower-cased.
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    /// Decoded `application/x-www-form-urlencoded` body fields.
    pub form: HashMap<String, String>,
}

impl AuthRequest {
    /// Start building a request for `method` and `target` (`/path?query`).
    pub fn builder(method: &str, target: &str) -> AuthRequestBuilder {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        AuthRequestBuilder {
            request: AuthRequest {
                method: method.to_uppercase(),
                path,
                query,
                ..Default::default()
            },
        }
    }

    /// Convert a hyper request, collecting at most [`DEFAULT_BODY_LIMIT`] bytes
    /// of body.
    ///
    /// Cookies come from every `Cookie` header. The body is only parsed when the
    /// media type is `application/x-www-form-urlencoded`.
    pub async fn from_hyper<B>(request: hyper::Request<B>) -> Result<Self, RequestError>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::from_hyper_with_limit(request, DEFAULT_BODY_LIMIT).await
    }

    /// [`AuthRequest::from_hyper`] with an explicit body limit
    pub async fn from_hyper_with_limit<B>(
        request: hyper::Request<B>,
        limit: usize,
    ) -> Result<Self, RequestError>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = request.into_parts();

        let mut headers = HashMap::new();
        let mut cookies = HashMap::new();
        for (name, value) in parts.headers.iter() {
            let Ok(value) = value.to_str() else {
                continue;
            };
            if name == hyper::header::COOKIE {
                cookies.extend(parse_cookie_header(value));
                continue;
            }
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let is_form = headers
            .get("content-type")
            .and_then(|ct| ct.split(';').next())
            .map(|media_type| {
                media_type
                    .trim()
                    .eq_ignore_ascii_case("application/x-www-form-urlencoded")
            })
            .unwrap_or(false);

        let form = if is_form {
            let bytes = Limited::new(body, limit)
                .collect()
                .await
                .map_err(|e| {
                    if e.downcast_ref::<LengthLimitError>().is_some() {
                        RequestError::TooLarge(limit)
                    } else {
                        RequestError::Body(e.to_string())
                    }
                })?
                .to_bytes();
            let text = std::str::from_utf8(&bytes).map_err(|_| RequestError::Utf8)?;
            parse_query(Some(text))
        } else {
            HashMap::new()
        };

        Ok(Self {
            method: parts.method.as_str().to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers,
            cookies,
            form,
        })
    }

    /// Get header value by name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get a decoded query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        parse_query(self.query.as_deref()).remove(name)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }

    /// The literal request target: the path, plus `?query` when a query is present.
    pub fn target(&self) -> String {
        match self.query.as_deref() {
            Some(q) if !q.is_empty() => format!("{}?{}", self.path, q),
            _ => self.path.clone(),
        }
    }
}

/// Builder for [`AuthRequest`]
#[derive(Debug)]
pub struct AuthRequestBuilder {
    request: AuthRequest,
}

impl AuthRequestBuilder {
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.request
            .headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: &str, value: &str) -> Self {
        self.request
            .cookies
            .insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn form(mut self, name: &str, value: &str) -> Self {
        self.request.form.insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> AuthRequest {
        self.request
    }
}

/// Parse an urlencoded `a=b&c=d` string. Later duplicates win.
pub(crate) fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    if let Some(q) = query {
        for pair in q.split('&').filter(|p| !p.is_empty()) {
            let mut kv = pair.splitn(2, '=');
            if let Some(key) = kv.next() {
                let value = kv.next().unwrap_or("");
                params.insert(form_decode(key), form_decode(value));
            }
        }
    }
    params
}

fn form_decode(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    percent_encoding::percent_decode_str(&plus_decoded)
        .decode_utf8_lossy()
        .into_owned()
}

fn parse_cookie_header(value: &str) -> impl Iterator<Item = (String, String)> + '_ {
    value.split(';').filter_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        let value = value.trim().trim_matches('"');
        Some((name.trim().to_string(), value.to_string()))
    })
}
