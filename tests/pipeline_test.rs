//! Authentication pipeline integration tests
//!
//! Chain ordering, failure aggregation, identity notifications, identity
//! persistence and unauthenticated redirects.

#[cfg(test)]
mod tests {
    use portcullis::auth::{
        Authenticator, AuthenticatorKind, FormAuthenticator, HttpBasicAuthenticator,
        SessionAuthenticator, TokenAuthenticator, TokenLocation,
    };
    use portcullis::identifier::{
        Identifier, MemoryResolver, PasswordIdentifier, TokenIdentifier,
    };
    use portcullis::service::{
        AuthenticationService, ChannelListener, IdentifiedEvent, IdentityListener,
    };
    use portcullis::session::MemorySessionStore;
    use portcullis::url_checker::{DefaultUrlChecker, UrlCheckOptions};
    use portcullis::{AuthRequest, FailureReason};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // ========================================================================
    // Helpers
    // ========================================================================

    fn users() -> Arc<MemoryResolver> {
        Arc::new(MemoryResolver::from_values([
            json!({"id": 1, "username": "mariano", "password": "hashed:password", "token": "abc123"}),
            json!({"id": 2, "username": "larry", "password": "hashed:secret", "token": "xyz789"}),
        ]))
    }

    fn password_identifier() -> Identifier {
        let hasher = |plain: &str, hashed: &str| hashed == format!("hashed:{}", plain);
        Identifier::Password(PasswordIdentifier::new(users(), Arc::new(hasher)))
    }

    fn token_identifier() -> Identifier {
        Identifier::Token(TokenIdentifier::new(users()))
    }

    fn token_authenticator() -> Authenticator {
        Authenticator::Token(TokenAuthenticator::new(TokenLocation {
            header: Some("Authorization".into()),
            query_param: Some("api_key".into()),
            token_prefix: Some("Token".into()),
        }))
    }

    fn login_form() -> Authenticator {
        let checker =
            DefaultUrlChecker::new(Some(vec!["/login".into()]), UrlCheckOptions::default())
                .unwrap();
        Authenticator::Form(FormAuthenticator::new().with_url_checker(Arc::new(checker)))
    }

    fn login(username: &str, password: &str) -> AuthRequest {
        AuthRequest::builder("POST", "/login")
            .form("username", username)
            .form("password", password)
            .build()
    }

    // ========================================================================
    // TEST: Chain ordering
    // ========================================================================

    #[tokio::test]
    async fn test_first_success_wins() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .identifier(token_identifier())
            .authenticator(token_authenticator())
            .authenticator(login_form())
            .build()
            .unwrap();

        let request = AuthRequest::builder("POST", "/login")
            .header("Authorization", "Token xyz789")
            .form("username", "mariano")
            .form("password", "password")
            .build();

        let result = service.authenticate(&request).await;
        assert!(result.is_valid());
        assert_eq!(result.identity().unwrap().get("id"), Some(&json!(2)));
        assert_eq!(result.authentication_provider().unwrap().name(), "Token");
        assert_eq!(result.identification_provider(), Some("Token"));
    }

    #[tokio::test]
    async fn test_later_authenticator_used_after_skip() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .authenticator(token_authenticator())
            .authenticator(login_form())
            .build()
            .unwrap();

        let result = service.authenticate(&login("mariano", "password")).await;
        assert!(result.is_valid());
        assert_eq!(
            result.authentication_provider().unwrap().kind,
            AuthenticatorKind::Form
        );
        assert_eq!(result.identification_provider(), Some("Password"));
    }

    #[tokio::test]
    async fn test_everything_skipped() {
        let service = AuthenticationService::builder()
            .identifier(token_identifier())
            .authenticator(token_authenticator())
            .authenticator(login_form())
            .build()
            .unwrap();

        let result = service
            .authenticate(&AuthRequest::builder("GET", "/articles").build())
            .await;
        assert!(!result.is_valid());
        assert_eq!(result.reason(), Some(FailureReason::NoAuthenticatorMatched));
        assert!(result.failed_authenticator().is_none());
    }

    #[tokio::test]
    async fn test_challenge_halts_chain() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .identifier(token_identifier())
            .authenticator(Authenticator::HttpBasic(
                HttpBasicAuthenticator::new().with_realm("api"),
            ))
            .authenticator(token_authenticator())
            .build()
            .unwrap();

        let request = AuthRequest::builder("GET", "/")
            .header("Authorization", "Token abc123")
            .build();
        let result = service.authenticate(&request).await;

        assert_eq!(result.reason(), Some(FailureReason::ChallengeRequired));
        assert_eq!(
            result.failed_authenticator().unwrap().kind,
            AuthenticatorKind::HttpBasic
        );
        let challenge = result.challenge().unwrap();
        assert_eq!(challenge.status, 401);
        assert_eq!(
            challenge.header("www-authenticate"),
            Some("Basic realm=\"api\"")
        );
    }

    #[tokio::test]
    async fn test_success_before_halting_authenticator() {
        let service = AuthenticationService::builder()
            .identifier(token_identifier())
            .authenticator(token_authenticator())
            .authenticator(Authenticator::HttpBasic(HttpBasicAuthenticator::new()))
            .build()
            .unwrap();

        let request = AuthRequest::builder("GET", "/?api_key=abc123").build();
        let result = service.authenticate(&request).await;
        assert!(result.is_valid());
        assert!(result.challenge().is_none());
    }

    // ========================================================================
    // TEST: Failure aggregation
    // ========================================================================

    #[tokio::test]
    async fn test_most_specific_failure_reported() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .identifier(token_identifier())
            .authenticator(login_form())
            .authenticator(token_authenticator())
            .build()
            .unwrap();

        // Form: password missing. Token: unknown token.
        let request = AuthRequest::builder("POST", "/login")
            .header("Authorization", "Token unknown")
            .form("username", "mariano")
            .build();
        let result = service.authenticate(&request).await;

        assert_eq!(result.reason(), Some(FailureReason::IdentityNotFound));
        assert_eq!(result.failed_authenticator().unwrap().name(), "Token");
    }

    #[tokio::test]
    async fn test_tie_goes_to_earliest() {
        let service = AuthenticationService::builder()
            .identifier(token_identifier())
            .named_authenticator("HeaderToken", token_authenticator())
            .named_authenticator(
                "QueryToken",
                Authenticator::Token(TokenAuthenticator::new(TokenLocation {
                    header: None,
                    query_param: Some("token".into()),
                    token_prefix: None,
                })),
            )
            .build()
            .unwrap();

        let request = AuthRequest::builder("GET", "/?token=nope")
            .header("Authorization", "Token nope")
            .build();
        let result = service.authenticate(&request).await;

        assert_eq!(result.reason(), Some(FailureReason::IdentityNotFound));
        assert_eq!(result.failed_authenticator().unwrap().name(), "HeaderToken");
    }

    #[tokio::test]
    async fn test_skip_does_not_mask_failure() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .authenticator(login_form())
            .authenticator(token_authenticator())
            .build()
            .unwrap();

        let result = service.authenticate(&login("mariano", "wrong")).await;
        assert_eq!(result.reason(), Some(FailureReason::IdentityNotFound));
        assert_eq!(
            result.failed_authenticator().unwrap().kind,
            AuthenticatorKind::Form
        );
    }

    // ========================================================================
    // TEST: Identity notifications
    // ========================================================================

    struct CountingListener(AtomicUsize);

    impl IdentityListener for CountingListener {
        fn identified(&self, event: &IdentifiedEvent<'_>) {
            assert_eq!(event.service.authenticators().count(), 1);
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_login_then_session_notifies_once() {
        let store = Arc::new(MemorySessionStore::default());
        let session_id = store.create_session();
        let (listener, mut events) = ChannelListener::new();

        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .authenticator(Authenticator::Session(SessionAuthenticator::new(
                store.clone(),
            )))
            .authenticator(login_form())
            .listener(Arc::new(listener))
            .build()
            .unwrap();

        // First request: form login
        let request = AuthRequest::builder("POST", "/login")
            .cookie("sessionid", &session_id)
            .form("username", "mariano")
            .form("password", "password")
            .build();
        let result = service.authenticate(&request).await;
        assert!(result.is_valid());
        service
            .persist_identity(&request, result.identity().unwrap())
            .await
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.authenticator.kind, AuthenticatorKind::Form);
        assert_eq!(event.identity.get("id"), Some(&json!(1)));

        // Second request: restored from the session, no new notification
        let request = AuthRequest::builder("GET", "/articles")
            .cookie("sessionid", &session_id)
            .build();
        let result = service.authenticate(&request).await;
        assert!(result.is_valid());
        assert_eq!(
            result.authentication_provider().unwrap().kind,
            AuthenticatorKind::Session
        );
        assert!(result.identification_provider().is_none());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stateless_success_does_not_notify() {
        let (listener, mut events) = ChannelListener::new();
        let service = AuthenticationService::builder()
            .identifier(token_identifier())
            .authenticator(token_authenticator())
            .listener(Arc::new(listener))
            .build()
            .unwrap();

        let request = AuthRequest::builder("GET", "/")
            .header("Authorization", "Token abc123")
            .build();
        assert!(service.authenticate(&request).await.is_valid());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_listener_sees_service() {
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .authenticator(login_form())
            .listener(listener.clone())
            .build()
            .unwrap();

        assert!(service.authenticate(&login("larry", "secret")).await.is_valid());
        assert!(!service.authenticate(&login("larry", "nope")).await.is_valid());
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // TEST: Persist / clear
    // ========================================================================

    fn session_then_form(store: Arc<MemorySessionStore>) -> AuthenticationService {
        AuthenticationService::builder()
            .identifier(password_identifier())
            .authenticator(Authenticator::Session(SessionAuthenticator::new(store)))
            .authenticator(login_form())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_clear_identity_ends_session() {
        let store = Arc::new(MemorySessionStore::default());
        let session_id = store.create_session();
        let service = session_then_form(store.clone());

        let request = AuthRequest::builder("POST", "/login")
            .cookie("sessionid", &session_id)
            .form("username", "mariano")
            .form("password", "password")
            .build();
        let identity = service.authenticate(&request).await.identity().cloned().unwrap();
        let cookies = service.persist_identity(&request, &identity).await.unwrap();
        assert!(cookies.is_empty());

        let follow_up = AuthRequest::builder("GET", "/")
            .cookie("sessionid", &session_id)
            .build();
        assert!(service.authenticate(&follow_up).await.is_valid());

        service.clear_identity(&follow_up).await.unwrap();
        let result = service.authenticate(&follow_up).await;
        assert_eq!(result.reason(), Some(FailureReason::NoAuthenticatorMatched));
    }

    #[tokio::test]
    async fn test_persist_without_session_fails() {
        let store = Arc::new(MemorySessionStore::default());
        let service = session_then_form(store);

        let request = login("mariano", "password");
        let identity = service.authenticate(&request).await.identity().cloned().unwrap();
        assert!(service.persist_identity(&request, &identity).await.is_err());
    }

    // ========================================================================
    // TEST: Redirects
    // ========================================================================

    #[tokio::test]
    async fn test_unauthenticated_redirect_round_trip() {
        let service = AuthenticationService::builder()
            .identifier(password_identifier())
            .authenticator(login_form())
            .unauthenticated_redirect("/login", Some("redirect"))
            .build()
            .unwrap();

        let original = AuthRequest::builder("GET", "/articles/edit?id=7").build();
        let result = service.authenticate(&original).await;
        assert!(!result.is_valid());

        let url = service.unauthenticated_redirect_url(&original).unwrap();
        assert_eq!(url, "/login?redirect=/articles/edit%3Fid%3D7");

        let login_request = AuthRequest::builder("POST", &url).build();
        assert_eq!(
            service.login_redirect(&login_request).as_deref(),
            Some("/articles/edit?id=7")
        );
    }

    #[tokio::test]
    async fn test_external_redirect_rejected() {
        let service = AuthenticationService::builder()
            .authenticator(login_form())
            .unauthenticated_redirect("/login", Some("redirect"))
            .build()
            .unwrap();

        let request =
            AuthRequest::builder("POST", "/login?redirect=https%3A%2F%2Fevil.example.com")
                .build();
        assert!(service.login_redirect(&request).is_none());
    }

    #[tokio::test]
    async fn test_no_redirect_configured() {
        let service = AuthenticationService::builder()
            .authenticator(login_form())
            .build()
            .unwrap();
        let request = AuthRequest::builder("GET", "/private").build();
        assert!(service.unauthenticated_redirect_url(&request).is_none());
        assert!(service.login_redirect(&request).is_none());
    }
}
