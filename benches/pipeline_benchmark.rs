//! Pipeline Benchmarks
//!
//! Measures a full pass through a configured authenticator chain for the
//! common request shapes, plus the cookie token derivation on its own.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use jsonwebtoken::{encode, EncodingKey, Header};
use portcullis::config::{Collaborators, ConfigLoader};
use portcullis::cookie::{CookieToken, Salt};
use portcullis::identifier::MemoryResolver;
use portcullis::service::AuthenticationService;
use portcullis::session::MemorySessionStore;
use portcullis::AuthRequest;
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

const CONFIG: &str = r#"
security:
  salt: bench-salt
identifiers:
  - type: password
  - type: token
authenticators:
  - type: session
  - type: form
    login_url: /login
  - type: token
    query_param: api_key
  - type: jwt
    secret_key: bench-secret
  - type: cookie
"#;

fn service() -> AuthenticationService {
    let users = MemoryResolver::from_values((0..1000).map(|i| {
        json!({
            "id": i,
            "username": format!("user{}", i),
            "password": format!("hashed:password{}", i),
            "token": format!("token-{}", i),
        })
    }));
    let hasher = |plain: &str, hashed: &str| hashed.strip_prefix("hashed:") == Some(plain);
    let collaborators = Collaborators::new()
        .with_resolver(Arc::new(users))
        .with_hasher(Arc::new(hasher))
        .with_session_store(Arc::new(MemorySessionStore::default()));

    ConfigLoader::from_str(CONFIG)
        .unwrap()
        .build_service(collaborators)
        .unwrap()
}

/// One authenticate call per request shape
fn bench_authenticate(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let service = service();

    let token = encode(
        &Header::default(),
        &json!({"sub": "500", "exp": 4102444800u64}),
        &EncodingKey::from_secret(b"bench-secret"),
    )
    .unwrap();
    let cookie = CookieToken::issue("user500", "hashed:password500", &Salt::new(b"bench-salt"));

    let requests = [
        (
            "form_login",
            AuthRequest::builder("POST", "/login")
                .form("username", "user500")
                .form("password", "password500")
                .build(),
        ),
        ("api_token", AuthRequest::builder("GET", "/api?api_key=token-500").build()),
        (
            "jwt",
            AuthRequest::builder("GET", "/api")
                .header("Authorization", &format!("Bearer {}", token))
                .build(),
        ),
        (
            "remember_cookie",
            AuthRequest::builder("GET", "/dashboard")
                .cookie("CookieAuth", &cookie.encode())
                .build(),
        ),
        ("anonymous", AuthRequest::builder("GET", "/dashboard").build()),
    ];

    let mut group = c.benchmark_group("authenticate");
    for (name, request) in &requests {
        group.bench_function(*name, |b| {
            b.to_async(&rt).iter(|| async {
                black_box(service.authenticate(black_box(request)).await);
            });
        });
    }
    group.finish();
}

/// Benchmark remember-me token derivation and verification
fn bench_cookie_token(c: &mut Criterion) {
    let salt = Salt::new(b"bench-salt");
    let token = CookieToken::issue("mariano", "hashed:password", &salt);

    c.bench_function("cookie_token_issue", |b| {
        b.iter(|| black_box(CookieToken::issue("mariano", black_box("hashed:password"), &salt)));
    });

    c.bench_function("cookie_token_verify", |b| {
        b.iter(|| black_box(token.verify(black_box("hashed:password"), &salt)));
    });
}

criterion_group!(benches, bench_authenticate, bench_cookie_token);
criterion_main!(benches);
