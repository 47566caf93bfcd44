//! Sign in with Apple.
//!
//! [`AppleIdClient`] covers the server side of the flow: it builds the
//! authorization URL, signs the ES256 client secret, exchanges authorization
//! codes at Apple's token endpoint and verifies identity tokens against
//! Apple's published keys.
mod authorize;
mod client;
mod client_secret;
mod config;
mod error;
mod http;
mod jwks;
mod jwt;
mod models;
mod random;

pub use authorize::build_authorize_url;
pub use client::AppleIdClient;
pub use client_secret::{CLIENT_SECRET_AUDIENCE, CLIENT_SECRET_TTL_SECS, ClientSecretClaims};
pub use client_secret::sign as sign_client_secret;
pub use config::{APPLE_AUTH_ENDPOINT, APPLE_KEYS_ENDPOINT, APPLE_TOKEN_ENDPOINT};
pub use config::{Config, ConfigKey};
pub use error::{BoxError, ConfigKeyError, Error, Result};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use jwks::{KeySet, PublicKey, SigningAlgorithm, fetch_key_set};
pub use jwt::{VerifyOptions, verify};
pub use models::{Audience, TokenResponse, VerifiedClaims};
pub use random::RandomSource;
pub use random::SecureRandom;

#[cfg(feature = "mock")]
pub use random::mock;
