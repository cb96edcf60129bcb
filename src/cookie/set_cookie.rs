//! `Set-Cookie` values handed back to the response layer

use serde::{Deserialize, Serialize};

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie attributes, passed through to whoever sets the cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieAttributes {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    /// Lifetime in seconds; unset means a browser-session cookie
    #[serde(default)]
    pub expires_seconds: Option<i64>,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_http_only")]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: Option<SameSite>,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            expires_seconds: None,
            path: default_cookie_path(),
            domain: None,
            secure: false,
            http_only: default_http_only(),
            same_site: None,
        }
    }
}

fn default_cookie_name() -> String {
    "CookieAuth".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_http_only() -> bool {
    true
}

/// A cookie to set (or expire) on the response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub value: String,
    pub attributes: CookieAttributes,
    expired: bool,
}

impl SetCookie {
    pub fn new(value: String, attributes: CookieAttributes) -> Self {
        Self {
            value,
            attributes,
            expired: false,
        }
    }

    /// A cookie that deletes any existing cookie of the same name
    pub fn expired(attributes: CookieAttributes) -> Self {
        Self {
            value: String::new(),
            attributes,
            expired: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Render as a `Set-Cookie` header value
    pub fn to_header_value(&self) -> String {
        let attrs = &self.attributes;
        let mut parts = vec![format!("{}={}", attrs.name, self.value)];

        if self.expired {
            parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string());
            parts.push("Max-Age=0".to_string());
        } else if let Some(seconds) = attrs.expires_seconds {
            let expires = chrono::Utc::now() + chrono::Duration::seconds(seconds);
            parts.push(format!(
                "Expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
            parts.push(format!("Max-Age={}", seconds));
        }

        parts.push(format!("Path={}", attrs.path));
        if let Some(domain) = &attrs.domain {
            parts.push(format!("Domain={}", domain));
        }
        if attrs.secure {
            parts.push("Secure".to_string());
        }
        if attrs.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = attrs.same_site {
            parts.push(format!("SameSite={}", same_site.as_str()));
        }

        parts.join("; ")
    }
}
