//! Redirect helpers for unauthenticated requests

use crate::request::AuthRequest;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left readable in the encoded target
const TARGET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// Where unauthenticated requests go, and which query parameter carries the
/// original target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectConfig {
    pub url: String,
    pub query_param: Option<String>,
}

impl RedirectConfig {
    /// Redirect URL for `request`, with its target appended when a query
    /// parameter is configured
    pub fn unauthenticated_url(&self, request: &AuthRequest) -> String {
        let Some(param) = &self.query_param else {
            return self.url.clone();
        };
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.url,
            separator,
            param,
            utf8_percent_encode(&request.target(), TARGET)
        )
    }

    /// The post-login target carried by `request`, if present and local
    pub fn login_redirect(&self, request: &AuthRequest) -> Option<String> {
        let param = self.query_param.as_deref()?;
        sanitize_redirect(&request.query_param(param)?)
    }
}

/// Normalise `target` to a local `path[?query]`, rejecting anything that could
/// leave the site: schemes, protocol-relative `//host`, backslashes and control
/// characters. Fragments are dropped.
pub fn sanitize_redirect(target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty()
        || target.starts_with("//")
        || target.contains('\\')
        || target.chars().any(char::is_control)
    {
        return None;
    }

    let end_of_scheme = target.find(['/', '?', '#']).unwrap_or(target.len());
    if target[..end_of_scheme].contains(':') {
        return None;
    }

    let target = target.split('#').next().unwrap_or_default();
    if target.is_empty() {
        return Some("/".to_string());
    }
    if target.starts_with('/') {
        Some(target.to_string())
    } else {
        Some(format!("/{}", target))
    }
}
