use std::{
    marker::PhantomData,
    time::{Duration, Instant},
};

use common::{Now, SystemNow};
use http::header::ACCEPT;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{
    authorize::build_authorize_url,
    client_secret,
    config::{Config, ConfigKey},
    error::{Error, Result},
    http::{HttpTransport, ReqwestTransport},
    jwks::{KeySet, fetch_key_set},
    jwt::{self, VerifyOptions},
    models::{TokenResponse, VerifiedClaims},
    random::{RandomSource, SecureRandom},
};

/// Sign in with Apple client.
///
/// Builds authorization URLs, exchanges authorization codes and verifies
/// identity tokens. Without a key set cache every verification fetches
/// Apple's current keys.
pub struct AppleIdClient<T, N = SystemNow, R = SecureRandom> {
    transport: T,
    config: Config,
    key_set_cache: Option<KeySetCache>,
    _phantom: PhantomData<(N, R)>,
}

struct KeySetCache {
    ttl: Duration,
    entry: RwLock<Option<(KeySet, Instant)>>,
}

impl AppleIdClient<ReqwestTransport> {
    /// Creates a new [`AppleIdClient`] talking to Apple over [`reqwest`].
    ///
    /// # Errors
    /// - the http client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self::with_transport(ReqwestTransport::new()?, config))
    }
}

impl<T, N, R> AppleIdClient<T, N, R>
where
    T: HttpTransport,
    N: Now,
    R: RandomSource,
{
    /// Creates a client on top of a custom transport.
    pub fn with_transport(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            key_set_cache: None,
            _phantom: PhantomData,
        }
    }

    /// Reuses a fetched key set for `ttl`. A token signed with a key id that is
    /// not in the cached set triggers a refetch.
    #[must_use]
    pub fn with_key_set_cache(mut self, ttl: Duration) -> Self {
        self.key_set_cache = Some(KeySetCache {
            ttl,
            entry: RwLock::new(None),
        });
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generates an unguessable `state` value for [`Self::authorize_url`].
    #[must_use]
    pub fn generate_state() -> String {
        R::base64_url(32)
    }

    /// Returns the URL of Apple's sign in page.
    ///
    /// # Errors
    /// - `clientId` or `redirectUri` is not configured
    pub fn authorize_url(&self, state: &str) -> Result<String> {
        build_authorize_url(state, &self.config)
    }

    /// Signs a fresh client secret.
    ///
    /// # Errors
    /// - see [`client_secret::sign`]
    pub fn generate_client_secret(&self) -> Result<String> {
        client_secret::sign(&self.config, N::now())
    }

    /// Fetches Apple's current public keys, bypassing any cache.
    ///
    /// # Errors
    /// - see [`fetch_key_set`]
    pub async fn fetch_key_set(&self) -> Result<KeySet> {
        fetch_key_set(
            &self.transport,
            self.config.get(ConfigKey::ApiKeysEndpoint)?,
        )
        .await
    }

    /// Verifies an identity token and returns its claims.
    ///
    /// Only signature and lifetime are checked, see
    /// [`Self::verify_and_decode_jwt_with`] to pin issuer and audience.
    ///
    /// # Errors
    /// - fetching the key set fails
    /// - see [`jwt::verify`]
    pub async fn verify_and_decode_jwt(&self, token: &str) -> Result<VerifiedClaims> {
        self.verify_and_decode_jwt_with(token, &VerifyOptions::default())
            .await
    }

    /// Verifies an identity token with additional constraints.
    ///
    /// # Errors
    /// - fetching the key set fails
    /// - see [`jwt::verify`]
    #[instrument(skip_all, err)]
    pub async fn verify_and_decode_jwt_with(
        &self,
        token: &str,
        options: &VerifyOptions,
    ) -> Result<VerifiedClaims> {
        let Some(cache) = &self.key_set_cache else {
            let key_set = self.fetch_key_set().await?;
            return jwt::verify(token, &key_set, options, N::timestamp());
        };

        if let Some(key_set) = cache.get().await {
            match jwt::verify(token, &key_set, options, N::timestamp()) {
                Err(Error::UnknownKey(kid)) => {
                    debug!(kid = %kid, "key id not in cached key set, refetching");
                }
                result => return result,
            }
        }

        let key_set = self.fetch_key_set().await?;
        cache.put(key_set.clone()).await;
        jwt::verify(token, &key_set, options, N::timestamp())
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    /// - the client secret cannot be signed
    /// - the request fails at the network level
    /// - the token endpoint answers with a non-success status
    /// - the response body is not a JSON token response
    #[instrument(skip_all, err)]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let client_secret = self.generate_client_secret()?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.get(ConfigKey::RedirectUri)?),
            ("client_id", self.config.get(ConfigKey::ClientId)?),
            ("client_secret", client_secret.as_str()),
        ];

        let response = self
            .transport
            .post_form(
                self.config.get(ConfigKey::ApiTokenEndpoint)?,
                &form,
                &[(ACCEPT.as_str(), "application/json")],
            )
            .await
            .map_err(Error::Transport)?;

        if !response.status.is_success() {
            return Err(Error::TokenExchange {
                status: response.status,
                body: response.body,
            });
        }

        let token: TokenResponse =
            serde_json::from_str(&response.body).map_err(Error::ResponseDecode)?;
        debug!(
            has_id_token = token.id_token.is_some(),
            has_refresh_token = token.refresh_token.is_some(),
            "exchanged authorization code"
        );
        Ok(token)
    }
}

impl KeySetCache {
    async fn get(&self) -> Option<KeySet> {
        let entry = self.entry.read().await;
        match entry.as_ref() {
            Some((key_set, fetched_at)) if fetched_at.elapsed() < self.ttl => Some(key_set.clone()),
            _ => None,
        }
    }

    async fn put(&self, key_set: KeySet) {
        *self.entry.write().await = Some((key_set, Instant::now()));
    }
}
