//! Route scoping for authenticators
//!
//! Form and Cookie authenticators only act on their configured login URLs.
//! The check is a [`UrlChecker`] so applications can swap in their own
//! route-aware implementation.
//!
//! The URL compared is the literal request target: the path, or `path?query`
//! when `check_full_url` is set. Scheme and host are never part of it.

use crate::config::ConfigError;
use crate::request::AuthRequest;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Decides whether an authenticator applies to a request
pub trait UrlChecker: Debug + Send + Sync {
    fn matches(&self, request: &AuthRequest) -> bool;
}

/// One login URL or several, as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LoginUrls {
    Single(String),
    Multiple(Vec<String>),
}

impl LoginUrls {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            LoginUrls::Single(url) => vec![url],
            LoginUrls::Multiple(urls) => urls,
        }
    }
}

impl From<&str> for LoginUrls {
    fn from(url: &str) -> Self {
        LoginUrls::Single(url.to_string())
    }
}

/// Options shared by every checker configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlCheckOptions {
    /// Treat each URL as a regular expression (unanchored; use `^`/`$`)
    pub use_regex: bool,
    /// Compare against `path?query` instead of the path alone
    pub check_full_url: bool,
}

#[derive(Debug)]
enum Patterns {
    Any,
    Exact(Vec<String>),
    Regex(Vec<Regex>),
}

/// String or regex matching against configured login URLs
///
/// Regexes are compiled once, at construction.
#[derive(Debug)]
pub struct DefaultUrlChecker {
    patterns: Patterns,
    check_full_url: bool,
}

impl DefaultUrlChecker {
    /// `urls = None` matches every request.
    pub fn new(urls: Option<Vec<String>>, options: UrlCheckOptions) -> Result<Self, ConfigError> {
        let patterns = match urls {
            None => Patterns::Any,
            Some(urls) if options.use_regex => Patterns::Regex(
                urls.iter()
                    .map(|url| {
                        Regex::new(url).map_err(|e| {
                            ConfigError::ValidationError(format!(
                                "Invalid login URL pattern '{}': {}",
                                url, e
                            ))
                        })
                    })
                    .collect::<Result<_, _>>()?,
            ),
            Some(urls) => Patterns::Exact(urls),
        };

        Ok(Self {
            patterns,
            check_full_url: options.check_full_url,
        })
    }

    /// Checker that applies everywhere
    pub fn any() -> Self {
        Self {
            patterns: Patterns::Any,
            check_full_url: false,
        }
    }

    fn check(&self, path: &str, query: Option<&str>) -> bool {
        let url = request_url(path, query, self.check_full_url);
        match &self.patterns {
            Patterns::Any => true,
            Patterns::Exact(urls) => urls.iter().any(|u| u == &url),
            Patterns::Regex(regexes) => regexes.iter().any(|re| re.is_match(&url)),
        }
    }
}

impl UrlChecker for DefaultUrlChecker {
    fn matches(&self, request: &AuthRequest) -> bool {
        self.check(&request.path, request.query.as_deref())
    }
}

/// One-shot form of the check.
///
/// Patterns are compiled on every call; build a [`DefaultUrlChecker`] once
/// when the same URLs are checked repeatedly.
pub fn matches(
    path: &str,
    query: Option<&str>,
    urls: Option<&[String]>,
    use_regex: bool,
    check_full_url: bool,
) -> Result<bool, ConfigError> {
    let checker = DefaultUrlChecker::new(
        urls.map(<[String]>::to_vec),
        UrlCheckOptions {
            use_regex,
            check_full_url,
        },
    )?;
    Ok(checker.check(path, query))
}

fn request_url(path: &str, query: Option<&str>, check_full_url: bool) -> String {
    match query {
        Some(q) if check_full_url && !q.is_empty() => format!("{}?{}", path, q),
        _ => path.to_string(),
    }
}
