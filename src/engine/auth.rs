//! Credential challenges and token acquisition
//!
//! Token-secured services reject requests until a token is attached. The
//! single extension point is the `CredentialProvider` trait: given a
//! challenge (the service URL), it answers with a credential or declines.
//! `AuthContext` owns the provider plus a small LRU cache of issued tokens
//! keyed by service root, and is passed explicitly into the client; there
//! is no process-global authentication state.

use crate::engine::{EngineError, Result};
use instant::Instant;
use lru::LruCache;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

/// Token lifetime requested from the service, in minutes
const TOKEN_EXPIRATION_MINUTES: u32 = 60;

/// Cached tokens are dropped slightly before the requested lifetime ends
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(55 * 60);

/// Tokens are cached per service root; a screen rarely talks to more
const TOKEN_CACHE_CAPACITY: usize = 16;

/// An authentication handshake requested by a secured service
#[derive(Clone, Debug)]
pub struct CredentialChallenge {
    /// The service URL that rejected the request
    pub service_url: String,
}

/// A username/password pair answering a challenge
#[derive(Clone, Debug)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Strategy for answering credential challenges
pub trait CredentialProvider: Send + Sync {
    /// Answer a challenge, or decline by returning `None`
    fn resolve(&self, challenge: &CredentialChallenge) -> Option<Credential>;
}

/// Answers every challenge with one configured username/password pair.
///
/// A stand-in for a real authentication flow, wired from the CLI so demo
/// documents with editor-tracking enabled keep working. Not meant for
/// production use.
pub struct FixedCredentialProvider {
    credential: Credential,
}

impl FixedCredentialProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        FixedCredentialProvider {
            credential: Credential {
                username: username.into(),
                password: password.into(),
            },
        }
    }
}

impl CredentialProvider for FixedCredentialProvider {
    fn resolve(&self, _challenge: &CredentialChallenge) -> Option<Credential> {
        Some(self.credential.clone())
    }
}

struct CachedToken {
    token: String,
    issued: Instant,
}

/// Owns the credential provider and the per-service token cache
pub struct AuthContext {
    provider: Box<dyn CredentialProvider>,
    tokens: Mutex<LruCache<String, CachedToken>>,
}

impl AuthContext {
    pub fn new(provider: Box<dyn CredentialProvider>) -> Self {
        let capacity = NonZeroUsize::new(TOKEN_CACHE_CAPACITY)
            .unwrap_or(NonZeroUsize::MIN);
        AuthContext {
            provider,
            tokens: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Token for the service owning `service_url`, from cache or freshly
    /// issued via the provider. Fails when the provider declines or the
    /// service refuses to issue a token.
    pub async fn token_for(&self, http: &reqwest::Client, service_url: &str) -> Result<String> {
        let root = service_root(service_url);

        if let Some(token) = self.cached_token(&root) {
            return Ok(token);
        }

        let challenge = CredentialChallenge {
            service_url: service_url.to_string(),
        };
        let credential =
            self.provider
                .resolve(&challenge)
                .ok_or_else(|| EngineError::MissingCredential {
                    url: service_url.to_string(),
                })?;

        tracing::debug!("requesting token from {root} for user {}", credential.username);
        let token = generate_token(http, &root, &credential).await?;
        self.store_token(&root, token.clone());
        Ok(token)
    }

    /// Drop the cached token for a service, forcing re-issuance on the
    /// next challenge. Called when a service rejects a cached token.
    pub fn invalidate(&self, service_url: &str) {
        let root = service_root(service_url);
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.pop(&root);
        }
    }

    fn cached_token(&self, root: &str) -> Option<String> {
        let mut tokens = self.tokens.lock().ok()?;
        match tokens.get(root) {
            Some(cached) if cached.issued.elapsed() < TOKEN_CACHE_TTL => {
                Some(cached.token.clone())
            }
            Some(_) => {
                tokens.pop(root);
                None
            }
            None => None,
        }
    }

    fn store_token(&self, root: &str, token: String) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.put(
                root.to_string(),
                CachedToken {
                    token,
                    issued: Instant::now(),
                },
            );
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireTokenResponse {
    token: Option<String>,
    error: Option<WireTokenError>,
}

#[derive(Debug, Deserialize)]
struct WireTokenError {
    message: Option<String>,
}

async fn generate_token(
    http: &reqwest::Client,
    root: &str,
    credential: &Credential,
) -> Result<String> {
    let url = format!("{root}/generateToken");
    let expiration = TOKEN_EXPIRATION_MINUTES.to_string();
    let response: WireTokenResponse = http
        .post(&url)
        .form(&[
            ("username", credential.username.as_str()),
            ("password", credential.password.as_str()),
            ("client", "requestip"),
            ("expiration", expiration.as_str()),
            ("f", "json"),
        ])
        .send()
        .await?
        .json()
        .await?;

    match response.token {
        Some(token) => Ok(token),
        None => Err(EngineError::Token {
            url,
            message: response
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "no token in response".to_string()),
        }),
    }
}

/// Service root a token is scoped to: everything up to and including the
/// `rest/services` path segment, or scheme plus host when absent.
fn service_root(service_url: &str) -> String {
    let lower = service_url.to_ascii_lowercase();
    if let Some(idx) = lower.find("/rest/services") {
        return service_url[..idx + "/rest/services".len()].to_string();
    }

    // scheme://host[:port]
    if let Some(scheme_end) = service_url.find("://") {
        let rest = &service_url[scheme_end + 3..];
        let host_end = rest.find('/').unwrap_or(rest.len());
        return service_url[..scheme_end + 3 + host_end].to_string();
    }

    service_url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_root_stops_at_rest_services() {
        assert_eq!(
            service_root("https://example.com/arcgis/rest/services/Cities/FeatureServer/0/query"),
            "https://example.com/arcgis/rest/services"
        );
        assert_eq!(
            service_root("https://example.com/some/other/path"),
            "https://example.com"
        );
        assert_eq!(service_root("not-a-url"), "not-a-url");
    }

    #[test]
    fn fixed_provider_answers_every_challenge() {
        let provider = FixedCredentialProvider::new("user1", "user1");
        let credential = provider
            .resolve(&CredentialChallenge {
                service_url: "https://example.com/arcgis/rest/services/Secured/FeatureServer/0"
                    .into(),
            })
            .unwrap();
        assert_eq!(credential.username, "user1");
        assert_eq!(credential.password, "user1");
    }

    #[test]
    fn token_cache_round_trip_and_invalidate() {
        let context = AuthContext::new(Box::new(FixedCredentialProvider::new("u", "p")));
        let root = "https://example.com/arcgis/rest/services";

        assert!(context.cached_token(root).is_none());
        context.store_token(root, "abc123".into());
        assert_eq!(context.cached_token(root).as_deref(), Some("abc123"));

        context.invalidate("https://example.com/arcgis/rest/services/Cities/FeatureServer/0");
        assert!(context.cached_token(root).is_none());
    }

    struct DecliningProvider;
    impl CredentialProvider for DecliningProvider {
        fn resolve(&self, _challenge: &CredentialChallenge) -> Option<Credential> {
            None
        }
    }

    #[tokio::test]
    async fn declined_challenge_is_a_credential_error() {
        let context = AuthContext::new(Box::new(DecliningProvider));
        let http = reqwest::Client::new();
        let err = context
            .token_for(&http, "https://example.com/arcgis/rest/services/S/FeatureServer/0")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "CredentialError");
    }
}
