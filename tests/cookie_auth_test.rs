//! Remember-me cookie integration tests

#[cfg(test)]
mod tests {
    use portcullis::auth::{Authenticator, AuthenticatorKind, CookieAuthenticator, FormAuthenticator};
    use portcullis::cookie::{CookieAttributes, CookieToken, Salt, SameSite};
    use portcullis::identifier::{Identifier, MemoryResolver, PasswordIdentifier};
    use portcullis::service::{AuthenticationService, ChannelListener};
    use portcullis::url_checker::{DefaultUrlChecker, UrlCheckOptions};
    use portcullis::{AuthRequest, FailureReason};
    use serde_json::json;
    use std::sync::Arc;

    const SALT: &[u8] = b"application-salt";

    // ========================================================================
    // Helpers
    // ========================================================================

    fn password_identifier(stored_password: &str) -> Identifier {
        let users = MemoryResolver::from_values([json!({
            "id": 1,
            "username": "mariano",
            "password": stored_password,
        })]);
        let hasher = |plain: &str, hashed: &str| hashed == format!("hashed:{}", plain);
        Identifier::Password(PasswordIdentifier::new(Arc::new(users), Arc::new(hasher)))
    }

    fn scoped(urls: &[&str]) -> Arc<DefaultUrlChecker> {
        Arc::new(
            DefaultUrlChecker::new(
                Some(urls.iter().map(|u| u.to_string()).collect()),
                UrlCheckOptions::default(),
            )
            .unwrap(),
        )
    }

    fn service_with(stored_password: &str, salt: Salt) -> AuthenticationService {
        AuthenticationService::builder()
            .identifier(password_identifier(stored_password))
            .authenticator(Authenticator::Cookie(CookieAuthenticator::new(salt)))
            .authenticator(Authenticator::Form(
                FormAuthenticator::new().with_url_checker(scoped(&["/login"])),
            ))
            .build()
            .unwrap()
    }

    fn with_cookie(value: &str) -> AuthRequest {
        AuthRequest::builder("GET", "/dashboard")
            .cookie("CookieAuth", value)
            .build()
    }

    // ========================================================================
    // TEST: Login issues a cookie that authenticates later requests
    // ========================================================================

    #[tokio::test]
    async fn test_remember_me_flow() {
        let (listener, mut events) = ChannelListener::new();
        let service = AuthenticationService::builder()
            .identifier(password_identifier("hashed:password"))
            .authenticator(Authenticator::Cookie(CookieAuthenticator::new(Salt::new(SALT))))
            .authenticator(Authenticator::Form(
                FormAuthenticator::new().with_url_checker(scoped(&["/login"])),
            ))
            .listener(Arc::new(listener))
            .build()
            .unwrap();

        let login = AuthRequest::builder("POST", "/login")
            .form("username", "mariano")
            .form("password", "password")
            .form("remember_me", "1")
            .build();
        let result = service.authenticate(&login).await;
        assert!(result.is_valid());
        assert_eq!(events.try_recv().unwrap().authenticator.kind, AuthenticatorKind::Form);

        let cookies = service
            .persist_identity(&login, result.identity().unwrap())
            .await
            .unwrap();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name(), "CookieAuth");
        assert!(!cookies[0].is_expired());

        let result = service.authenticate(&with_cookie(&cookies[0].value)).await;
        assert!(result.is_valid());
        assert_eq!(
            result.authentication_provider().unwrap().kind,
            AuthenticatorKind::Cookie
        );
        assert_eq!(result.identity().unwrap().get("id"), Some(&json!(1)));

        // A cookie login is a fresh identification
        assert_eq!(
            events.try_recv().unwrap().authenticator.kind,
            AuthenticatorKind::Cookie
        );
    }

    #[tokio::test]
    async fn test_no_cookie_without_remember_me() {
        let service = service_with("hashed:password", Salt::new(SALT));

        for flag in [None, Some(""), Some("0"), Some("false"), Some("off")] {
            let mut builder = AuthRequest::builder("POST", "/login")
                .form("username", "mariano")
                .form("password", "password");
            if let Some(flag) = flag {
                builder = builder.form("remember_me", flag);
            }
            let login = builder.build();
            let identity = service.authenticate(&login).await.identity().cloned().unwrap();
            let cookies = service.persist_identity(&login, &identity).await.unwrap();
            assert!(cookies.is_empty(), "{:?}", flag);
        }
    }

    #[tokio::test]
    async fn test_persist_respects_login_url() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier("hashed:password"))
            .authenticator(Authenticator::Cookie(
                CookieAuthenticator::new(Salt::new(SALT)).with_url_checker(scoped(&["/login"])),
            ))
            .authenticator(Authenticator::Form(FormAuthenticator::new()))
            .build()
            .unwrap();

        let elsewhere = AuthRequest::builder("POST", "/signup")
            .form("username", "mariano")
            .form("password", "password")
            .form("remember_me", "on")
            .build();
        let identity = service.authenticate(&elsewhere).await.identity().cloned().unwrap();
        assert!(service.persist_identity(&elsewhere, &identity).await.unwrap().is_empty());

        // The scoped cookie authenticator also ignores cookies outside its URLs
        let token = CookieToken::issue("mariano", "hashed:password", &Salt::new(SALT));
        let result = service.authenticate(&with_cookie(&token.encode())).await;
        assert_eq!(result.reason(), Some(FailureReason::MissingCredentials));
    }

    // ========================================================================
    // TEST: Rejected cookies
    // ========================================================================

    #[tokio::test]
    async fn test_malformed_cookie() {
        let service = service_with("hashed:password", Salt::new(SALT));
        let result = service.authenticate(&with_cookie("%%%not-base64")).await;
        assert_eq!(result.reason(), Some(FailureReason::CredentialsInvalid));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let service = service_with("hashed:password", Salt::new(SALT));
        let token = CookieToken::issue("larry", "hashed:password", &Salt::new(SALT));
        let result = service.authenticate(&with_cookie(&token.encode())).await;
        assert_eq!(result.reason(), Some(FailureReason::IdentityNotFound));
    }

    #[tokio::test]
    async fn test_password_change_invalidates_cookie() {
        let token = CookieToken::issue("mariano", "hashed:password", &Salt::new(SALT));
        let service = service_with("hashed:changed", Salt::new(SALT));
        let result = service.authenticate(&with_cookie(&token.encode())).await;
        assert_eq!(result.reason(), Some(FailureReason::CredentialsInvalid));
    }

    #[tokio::test]
    async fn test_salt_rotation_invalidates_cookie() {
        let token = CookieToken::issue("mariano", "hashed:password", &Salt::new(b"old-salt"));
        let service = service_with("hashed:password", Salt::new(b"new-salt"));
        let result = service.authenticate(&with_cookie(&token.encode())).await;
        assert_eq!(result.reason(), Some(FailureReason::CredentialsInvalid));
    }

    #[tokio::test]
    async fn test_unsalted_tokens() {
        let token = CookieToken::issue("mariano", "hashed:password", &Salt::none());
        let service = service_with("hashed:password", Salt::none());
        assert!(service.authenticate(&with_cookie(&token.encode())).await.is_valid());

        let salted = service_with("hashed:password", Salt::new(SALT));
        assert!(!salted.authenticate(&with_cookie(&token.encode())).await.is_valid());
    }

    #[tokio::test]
    async fn test_forged_token_for_other_user() {
        let service = service_with("hashed:password", Salt::new(SALT));
        let genuine = CookieToken::issue("mariano", "hashed:password", &Salt::new(SALT));
        let mut hashed_token = genuine.hashed_token.clone();
        let last = if hashed_token.pop() == Some('0') { '1' } else { '0' };
        hashed_token.push(last);
        let forged = CookieToken {
            username: "mariano".into(),
            hashed_token,
        };
        assert_ne!(forged.hashed_token, genuine.hashed_token);
        let result = service.authenticate(&with_cookie(&forged.encode())).await;
        assert_eq!(result.reason(), Some(FailureReason::CredentialsInvalid));
    }

    // ========================================================================
    // TEST: Logout
    // ========================================================================

    #[tokio::test]
    async fn test_clear_identity_expires_cookie() {
        let attributes = CookieAttributes {
            name: "remember".into(),
            expires_seconds: Some(86400),
            secure: true,
            same_site: Some(SameSite::Lax),
            ..Default::default()
        };
        let service = AuthenticationService::builder()
            .identifier(password_identifier("hashed:password"))
            .authenticator(Authenticator::Cookie(
                CookieAuthenticator::new(Salt::new(SALT)).with_attributes(attributes),
            ))
            .build()
            .unwrap();

        let cookies = service
            .clear_identity(&AuthRequest::builder("GET", "/logout").build())
            .await
            .unwrap();
        assert_eq!(cookies.len(), 1);
        assert!(cookies[0].is_expired());
        assert_eq!(
            cookies[0].to_header_value(),
            "remember=; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; Path=/; Secure; HttpOnly; SameSite=Lax"
        );
    }
}
