//! Turning a [`Config`] into an [`AuthenticationService`]

use super::{
    AuthenticatorConfig, Config, ConfigError, CookieSettings, HttpDigestSettings,
    IdentifierConfig, JwtSettings, TokenSettings, UrlScopeSettings,
};
use crate::auth::{
    Authenticator, CookieAuthenticator, FieldMap, FormAuthenticator, HttpBasicAuthenticator,
    HttpDigestAuthenticator, JwtAuthenticator, SessionAuthenticator, TokenAuthenticator,
    TokenLocation,
};
use crate::identifier::{
    Identifier, IdentityResolver, JwtSubjectIdentifier, PasswordHasher, PasswordIdentifier,
    TokenIdentifier,
};
use crate::jwt::{is_hmac, JwksCache, JwksFetcher, JwtVerifier};
use crate::service::{
    AuthenticationService, AuthenticationServiceBuilder, IdentityListener, RemoteKeySet,
};
use crate::session::SessionStore;
use crate::url_checker::{DefaultUrlChecker, UrlChecker};
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::Duration;

/// Application-provided collaborators the configuration refers to
#[derive(Default)]
pub struct Collaborators {
    pub resolver: Option<Arc<dyn IdentityResolver>>,
    pub hasher: Option<Arc<dyn PasswordHasher>>,
    pub session_store: Option<Arc<dyn SessionStore>>,
    pub listeners: Vec<Arc<dyn IdentityListener>>,
    /// Appended after the configured identifiers
    pub identifiers: Vec<(String, Identifier)>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.hasher = Some(hasher);
        self
    }

    #[must_use]
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn IdentityListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    #[must_use]
    pub fn with_identifier(mut self, name: &str, identifier: Identifier) -> Self {
        self.identifiers.push((name.to_string(), identifier));
        self
    }

    fn resolver(&self, identifier: &str) -> Result<Arc<dyn IdentityResolver>, ConfigError> {
        self.resolver.clone().ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "Identifier '{}' needs an identity resolver",
                identifier
            ))
        })
    }
}

impl Config {
    /// Validate and resolve everything once, failing fast on any
    /// misconfiguration
    pub fn build_service(
        &self,
        collaborators: Collaborators,
    ) -> Result<AuthenticationService, ConfigError> {
        self.validate()?;

        let mut builder = AuthenticationService::builder();

        for identifier in &self.identifiers {
            builder = builder.named_identifier(
                identifier.name(),
                build_identifier(identifier, &collaborators)?,
            );
        }

        for authenticator in &self.authenticators {
            builder = self.add_authenticator(builder, authenticator, &collaborators)?;
        }

        if let Some(url) = &self.service.unauthenticated_redirect {
            builder = builder.unauthenticated_redirect(url, self.service.query_param.as_deref());
        }

        let Collaborators {
            listeners,
            identifiers,
            ..
        } = collaborators;
        for listener in listeners {
            builder = builder.listener(listener);
        }
        for (name, identifier) in identifiers {
            builder = builder.named_identifier(&name, identifier);
        }

        builder.build()
    }

    fn add_authenticator(
        &self,
        builder: AuthenticationServiceBuilder,
        config: &AuthenticatorConfig,
        collaborators: &Collaborators,
    ) -> Result<AuthenticationServiceBuilder, ConfigError> {
        let app_salt = self.security.salt.as_deref();

        let (authenticator, builder) = match config {
            AuthenticatorConfig::Session(settings) => {
                let store = collaborators.session_store.clone().ok_or_else(|| {
                    ConfigError::ValidationError(
                        "Session authenticator needs a session store".into(),
                    )
                })?;
                let fields = FieldMap::username_only().with_overrides(&settings.fields)?;
                let session = SessionAuthenticator::new(store)
                    .with_session_key(&settings.session_key)
                    .with_identify(settings.identify)
                    .with_fields(fields);
                (Authenticator::Session(session), builder)
            }
            AuthenticatorConfig::Form(settings) => {
                let form = FormAuthenticator::new()
                    .with_fields(FieldMap::credentials().with_overrides(&settings.fields)?)
                    .with_url_checker(url_checker(&settings.scope)?);
                (Authenticator::Form(form), builder)
            }
            AuthenticatorConfig::Token(settings) => (
                Authenticator::Token(TokenAuthenticator::new(token_location(settings)?)),
                builder,
            ),
            AuthenticatorConfig::Jwt(settings) => {
                let (verifier, key_set) = build_verifier(settings)?;
                let location = token_location(&TokenSettings {
                    name: None,
                    header: settings.header.clone(),
                    query_param: settings.query_param.clone(),
                    token_prefix: settings.token_prefix.clone(),
                })?;
                let jwt = JwtAuthenticator::new(verifier)
                    .with_location(location)
                    .with_return_payload(settings.return_payload)
                    .with_subject_key(&settings.subject_key);
                let builder = match key_set {
                    Some(key_set) => builder.remote_key_set(key_set),
                    None => builder,
                };
                (Authenticator::Jwt(jwt), builder)
            }
            AuthenticatorConfig::HttpBasic(settings) => {
                let mut basic = HttpBasicAuthenticator::new();
                if let Some(realm) = &settings.realm {
                    basic = basic.with_realm(realm);
                }
                (Authenticator::HttpBasic(basic), builder)
            }
            AuthenticatorConfig::HttpDigest(settings) => (
                Authenticator::HttpDigest(build_digest(settings, app_salt)?),
                builder,
            ),
            AuthenticatorConfig::Cookie(settings) => (
                Authenticator::Cookie(build_cookie(settings, app_salt)?),
                builder,
            ),
        };

        Ok(builder.named_authenticator(config.name(), authenticator))
    }
}

fn build_identifier(
    config: &IdentifierConfig,
    collaborators: &Collaborators,
) -> Result<Identifier, ConfigError> {
    let name = config.name();
    Ok(match config {
        IdentifierConfig::Password(settings) => {
            let hasher = collaborators.hasher.clone().ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "Identifier '{}' needs a password hasher",
                    name
                ))
            })?;
            Identifier::Password(
                PasswordIdentifier::new(collaborators.resolver(name)?, hasher)
                    .with_fields(settings.fields.clone()),
            )
        }
        IdentifierConfig::Token(settings) => Identifier::Token(
            TokenIdentifier::new(collaborators.resolver(name)?)
                .with_token_field(&settings.token_field)
                .with_data_field(&settings.data_field)
                .with_hash(settings.hash_algorithm),
        ),
        IdentifierConfig::JwtSubject(settings) => Identifier::JwtSubject(
            JwtSubjectIdentifier::new(collaborators.resolver(name)?)
                .with_token_field(&settings.token_field)
                .with_data_field(&settings.data_field),
        ),
    })
}

fn url_checker(scope: &UrlScopeSettings) -> Result<Arc<dyn UrlChecker>, ConfigError> {
    let urls = scope.login_url.clone().map(|urls| urls.into_vec());
    Ok(Arc::new(DefaultUrlChecker::new(urls, scope.options())?))
}

fn token_location(settings: &TokenSettings) -> Result<TokenLocation, ConfigError> {
    if settings.header.is_none() && settings.query_param.is_none() {
        return Err(ConfigError::ValidationError(
            "Token location needs a header or a query_param".into(),
        ));
    }
    Ok(TokenLocation {
        header: settings.header.clone(),
        query_param: settings.query_param.clone(),
        token_prefix: settings.token_prefix.clone(),
    })
}

impl JwtSettings {
    /// The verifier these settings describe, plus the remote key set to refresh
    /// when `jwks_url` is set
    pub fn build_verifier(&self) -> Result<(JwtVerifier, Option<RemoteKeySet>), ConfigError> {
        build_verifier(self)
    }
}

fn build_verifier(
    settings: &JwtSettings,
) -> Result<(JwtVerifier, Option<RemoteKeySet>), ConfigError> {
    settings.validate()?;
    let algorithm: Algorithm = settings.algorithm.parse().map_err(|_| {
        ConfigError::ValidationError(format!("Unknown JWT algorithm '{}'", settings.algorithm))
    })?;

    let mut remote = None;
    let verifier = if is_hmac(algorithm) {
        let secret = settings.secret_key.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "JWT algorithm {:?} needs secret_key",
                algorithm
            ))
        })?;
        JwtVerifier::with_secret(secret.as_bytes(), algorithm)?
    } else if let Some(pem) = &settings.public_key {
        JwtVerifier::with_public_key_pem(pem, algorithm)?
    } else if settings.jwks.is_some() || settings.jwks_url.is_some() {
        let ttl = Duration::from_secs(settings.jwks_cache_ttl_seconds);
        let cache = Arc::new(match &settings.jwks {
            Some(jwks) => JwksCache::from_jwks(jwks.clone(), ttl),
            None => JwksCache::new(ttl),
        });
        if let Some(url) = &settings.jwks_url {
            remote = Some(RemoteKeySet {
                fetcher: JwksFetcher::new(url),
                cache: Arc::clone(&cache),
            });
        }
        JwtVerifier::with_jwks(cache, algorithm)?
    } else {
        return Err(ConfigError::ValidationError(format!(
            "JWT algorithm {:?} needs public_key, jwks or jwks_url",
            algorithm
        )));
    };

    let mut verifier = verifier.with_leeway(settings.leeway_seconds);
    if let Some(issuer) = &settings.issuer {
        verifier = verifier.with_issuer(issuer);
    }
    if let Some(audience) = &settings.audience {
        verifier = verifier.with_audience(audience);
    }
    Ok((verifier, remote))
}

fn build_digest(
    settings: &HttpDigestSettings,
    app_salt: Option<&str>,
) -> Result<HttpDigestAuthenticator, ConfigError> {
    let secret = settings.secret.as_deref().or(app_salt).ok_or_else(|| {
        ConfigError::ValidationError(
            "Digest authenticator needs a secret or an application salt".into(),
        )
    })?;

    let mut digest = HttpDigestAuthenticator::new(secret)?
        .with_qop(&settings.qop)
        .with_nonce_lifetime(settings.nonce_lifetime_seconds)
        .with_algorithm(settings.algorithm)
        .with_fields(FieldMap::credentials().with_overrides(&settings.fields)?);
    if let Some(realm) = &settings.realm {
        digest = digest.with_realm(realm);
    }
    if let Some(opaque) = &settings.opaque {
        digest = digest.with_opaque(opaque);
    }
    Ok(digest)
}

fn build_cookie(
    settings: &CookieSettings,
    app_salt: Option<&str>,
) -> Result<CookieAuthenticator, ConfigError> {
    Ok(CookieAuthenticator::new(settings.salt.resolve(app_salt)?)
        .with_attributes(settings.cookie.clone())
        .with_remember_me_field(&settings.remember_me_field)
        .with_fields(FieldMap::credentials().with_overrides(&settings.fields)?)
        .with_url_checker(url_checker(&settings.scope)?))
}
