//! Identity token verification.
//!
//! Checks run in this order:
//! 1. token shape and header (`kid`, `alg`)
//! 2. key lookup by `kid`
//! 3. header `alg` against the key's algorithm
//! 4. `exp` and `nbf` against the clock
//! 5. signature
//! 6. issuer and audience, only when requested through [`VerifyOptions`]
use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use jsonwebtoken::{crypto, decode_header};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::{Error, Result},
    jwks::{KeySet, SigningAlgorithm},
    models::{VerifiedClaims, numeric_claim},
};

/// Optional constraints applied on top of signature and lifetime checks.
///
/// The default only enforces signature, `exp` and `nbf`. Any issuer whose key
/// is in the key set is trusted unless `issuer` and `audience` are pinned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Seconds of clock skew tolerated for `exp` and `nbf`.
    pub leeway: u64,
    /// Required `iss` claim.
    pub issuer: Option<String>,
    /// Client id that must be among the `aud` claim values.
    pub audience: Option<String>,
}

impl VerifyOptions {
    pub fn with_leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }
}

/// Verifies a compact serialized JWT against `key_set` at time `now`
/// (seconds since the UNIX epoch).
///
/// # Errors
/// - the token is not a well formed JWS with a `kid`
/// - no key in the set matches the `kid`
/// - the header `alg` is not ES256 or RS256, or differs from the key's algorithm
/// - the token has no `exp`, has expired, or is not valid yet
/// - the signature does not verify
/// - a pinned issuer or audience does not match
pub fn verify(
    token: &str,
    key_set: &KeySet,
    options: &VerifyOptions,
    now: i64,
) -> Result<VerifiedClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    let &[header_segment, payload_segment, signature] = segments.as_slice() else {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, found {}",
            segments.len()
        )));
    };

    let header = decode_header(token).map_err(|err| Error::MalformedToken(err.to_string()))?;
    let kid = header
        .kid
        .ok_or_else(|| Error::MalformedToken("missing kid".to_string()))?;

    let key = key_set
        .get(&kid)
        .ok_or_else(|| Error::UnknownKey(kid.clone()))?;

    let algorithm = SigningAlgorithm::from_jwt(header.alg)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("{:?}", header.alg)))?;
    if algorithm != key.algorithm() {
        return Err(Error::AlgorithmMismatch {
            token: algorithm.to_string(),
            key: key.algorithm().to_string(),
        });
    }

    let claims = decode_payload(payload_segment)?;
    check_lifetime(&claims, options.leeway, now)?;

    let message = &token[..header_segment.len() + 1 + payload_segment.len()];
    match crypto::verify(
        signature,
        message.as_bytes(),
        &key.decoding_key,
        algorithm.as_jwt(),
    ) {
        Ok(true) => {}
        Ok(false) => return Err(Error::SignatureInvalid),
        Err(err) => {
            debug!(error = %err, "signature could not be checked");
            return Err(Error::SignatureInvalid);
        }
    }

    let claims = VerifiedClaims::from_claims(claims);

    if let Some(issuer) = &options.issuer {
        if claims.issuer() != Some(issuer.as_str()) {
            return Err(Error::InvalidIssuer);
        }
    }
    if let Some(audience) = &options.audience {
        if !claims.audience().is_some_and(|aud| aud.contains(audience)) {
            return Err(Error::InvalidAudience);
        }
    }

    debug!(kid = %kid, algorithm = %algorithm, "verified token");
    Ok(claims)
}

fn decode_payload(segment: &str) -> Result<Map<String, Value>> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|err| Error::MalformedToken(format!("payload is not base64url: {err}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| Error::MalformedToken(format!("payload is not a JSON object: {err}")))
}

fn check_lifetime(claims: &Map<String, Value>, leeway: u64, now: i64) -> Result<()> {
    let leeway = i64::try_from(leeway).unwrap_or(i64::MAX);

    let exp = numeric_claim(claims, "exp").ok_or(Error::MissingClaim("exp"))?;
    if now.saturating_sub(leeway) >= exp {
        return Err(Error::ExpiredToken { exp });
    }

    if let Some(nbf) = numeric_claim(claims, "nbf") {
        if now.saturating_add(leeway) < nbf {
            return Err(Error::TokenNotYetValid { nbf });
        }
    }

    Ok(())
}
