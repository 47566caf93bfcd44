use http::StatusCode;

use crate::config::ConfigKey;

/// Boxed error raised by an [`crate::HttpTransport`] implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

/// Sign in with Apple errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigKeyError),

    #[error("failed to build http client: {0}")]
    BuildHttpClient(reqwest::Error),

    #[error("transport error: {0}")]
    Transport(BoxError),

    #[error("received {status} while fetching apple's public keys, response body: {body}")]
    KeySetFetch { status: StatusCode, body: String },

    #[error("failed to parse key set: {0}")]
    KeySetParse(serde_json::Error),

    #[error("received {status} while verifying authorization code, response body: {body}")]
    TokenExchange { status: StatusCode, body: String },

    #[error("failed to decode token response: {0}")]
    ResponseDecode(serde_json::Error),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("no key found for kid {0}")]
    UnknownKey(String),

    #[error("unsupported signing algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("token algorithm {token} does not match key algorithm {key}")]
    AlgorithmMismatch { token: String, key: String },

    #[error("invalid token signature")]
    SignatureInvalid,

    #[error("token expired at {exp}")]
    ExpiredToken { exp: i64 },

    #[error("token not valid before {nbf}")]
    TokenNotYetValid { nbf: i64 },

    #[error("missing claim {0}")]
    MissingClaim(&'static str),

    #[error("unexpected issuer")]
    InvalidIssuer,

    #[error("unexpected audience")]
    InvalidAudience,

    #[error("private key must be a string or a valid file path")]
    KeyMaterial,

    #[error("error processing private key, please check your 'privateKey' config value: {0}")]
    InvalidPrivateKey(jsonwebtoken::errors::Error),

    #[error("failed to sign client secret: {0}")]
    Sign(jsonwebtoken::errors::Error),
}

/// Errors raised while building or reading a [`crate::Config`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigKeyError {
    #[error("{0} is not a valid config value")]
    Unknown(String),

    #[error("config value '{0}' is not set")]
    Unset(ConfigKey),
}
