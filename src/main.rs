//! Portcullis - request-authentication pipeline tooling
//!
//! Validates configuration files and produces the values applications store:
//! remember-me cookie tokens, Digest HA1 hashes, and verified JWT claims.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use portcullis::auth::DigestAlgorithm;
use portcullis::config::{AuthenticatorConfig, Collaborators, Config};
use portcullis::cookie::CookieToken;
use portcullis::identifier::MemoryResolver;
use portcullis::logging::{init_subscriber, LogFormat};
use portcullis::metrics;
use portcullis::result::FailureReason;
use portcullis::session::MemorySessionStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Portcullis - pluggable request authentication
#[derive(Parser, Debug)]
#[command(name = "portcullis")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "portcullis.yaml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log format (text, json)
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Print the Prometheus metrics recorded by the command once it finishes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration, then print the chain
    Check,

    /// Derive a remember-me cookie value under the configured salt
    CookieToken {
        #[arg(short, long)]
        username: String,

        /// The stored password value (normally the password hash)
        #[arg(short, long)]
        password: String,
    },

    /// Compute the Digest HA1 value to store for a user
    DigestPassword {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        #[arg(short, long)]
        realm: String,

        /// MD5 or SHA-256
        #[arg(short, long, default_value = "MD5")]
        algorithm: String,
    },

    /// Verify a token against the first JWT authenticator and print its claims
    VerifyJwt {
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_subscriber(&args.log_level, args.log_format)?;

    let result = match args.command {
        Command::Check => check(&args.config),
        Command::CookieToken { username, password } => {
            cookie_token(&args.config, &username, &password)
        }
        Command::DigestPassword {
            username,
            password,
            realm,
            algorithm,
        } => {
            let algorithm = match algorithm.to_ascii_uppercase().as_str() {
                "MD5" => DigestAlgorithm::Md5,
                "SHA-256" | "SHA256" => DigestAlgorithm::Sha256,
                other => return Err(anyhow!("Unknown digest algorithm '{}'", other)),
            };
            println!("{}", algorithm.ha1(&username, &password, &realm));
            Ok(())
        }
        Command::VerifyJwt { token } => verify_jwt(&args.config, &token).await,
    };

    if args.metrics {
        print!("{}", metrics::render()?);
    }
    result
}

fn load(path: &PathBuf) -> anyhow::Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    info!("Loaded configuration from {:?}", path);
    Ok(config)
}

fn check(path: &PathBuf) -> anyhow::Result<()> {
    let config = load(path)?;

    // Stand-in collaborators: enough to resolve every setting
    let collaborators = Collaborators::new()
        .with_resolver(Arc::new(MemoryResolver::default()))
        .with_hasher(Arc::new(|_: &str, _: &str| false))
        .with_session_store(Arc::new(MemorySessionStore::default()));
    let service = config.build_service(collaborators)?;

    println!("Configuration OK");
    println!("Authenticators:");
    for (authenticator_ref, authenticator) in service.authenticators() {
        let mut flags = Vec::new();
        if authenticator.is_stateless() {
            flags.push("stateless");
        }
        if authenticator.is_persistent() {
            flags.push("persistent");
        }
        if authenticator.is_halting() {
            flags.push("halting");
        }
        println!(
            "  {} ({}) [{}]",
            authenticator_ref.name(),
            authenticator_ref.kind,
            flags.join(", ")
        );
    }
    println!("Identifiers:");
    for name in service.identifiers().names() {
        println!("  {}", name);
    }
    for key_set in service.remote_key_sets() {
        println!("JWKS endpoint: {}", key_set.fetcher.endpoint());
    }
    Ok(())
}

fn cookie_token(path: &PathBuf, username: &str, password: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let settings = config
        .authenticators
        .iter()
        .find_map(|a| match a {
            AuthenticatorConfig::Cookie(settings) => Some(settings),
            _ => None,
        })
        .ok_or_else(|| anyhow!("No cookie authenticator configured"))?;

    let salt = settings.salt.resolve(config.security.salt.as_deref())?;
    let token = CookieToken::issue(username, password, &salt);
    println!("{}={}", settings.cookie.name, token.encode());
    Ok(())
}

async fn verify_jwt(path: &PathBuf, token: &str) -> anyhow::Result<()> {
    let config = load(path)?;
    let settings = config
        .authenticators
        .iter()
        .find_map(|a| match a {
            AuthenticatorConfig::Jwt(settings) => Some(settings),
            _ => None,
        })
        .ok_or_else(|| anyhow!("No JWT authenticator configured"))?;

    let (verifier, remote) = settings.build_verifier()?;
    if let Some(remote) = remote {
        let keys = remote.fetcher.refresh(&remote.cache).await?;
        info!(endpoint = %remote.fetcher.endpoint(), keys, "JWKS fetched");
    }

    let claims = match verifier.verify(token) {
        Ok(claims) => {
            metrics::record_jwt_verification("accepted");
            claims
        }
        Err(e) => {
            let reason = FailureReason::from(e).as_str();
            metrics::record_jwt_verification(reason);
            return Err(anyhow!("Token rejected: {}", reason));
        }
    };
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}
