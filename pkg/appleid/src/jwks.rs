//! Fetching and parsing Apple's JSON Web Key Set.
use std::{collections::HashMap, fmt};

use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm},
};
use serde::Deserialize;
use serde_json::Value;
use http::header::ACCEPT;
use tracing::{debug, instrument, warn};

use crate::{
    error::{Error, Result},
    http::HttpTransport,
};

/// Signature algorithms the verifier accepts.
///
/// Each public key verifies with exactly one of these, derived from the key
/// type, never from the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    /// ECDSA on P-256 with SHA-256.
    Es256,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
}

impl SigningAlgorithm {
    pub(crate) fn as_jwt(self) -> Algorithm {
        match self {
            SigningAlgorithm::Es256 => Algorithm::ES256,
            SigningAlgorithm::Rs256 => Algorithm::RS256,
        }
    }

    pub(crate) fn from_jwt(alg: Algorithm) -> Option<Self> {
        match alg {
            Algorithm::ES256 => Some(SigningAlgorithm::Es256),
            Algorithm::RS256 => Some(SigningAlgorithm::Rs256),
            _ => None,
        }
    }

    /// The algorithm a JWK can verify, if it is one we support.
    fn for_jwk(jwk: &Jwk) -> Option<Self> {
        let family = match &jwk.algorithm {
            AlgorithmParameters::EllipticCurve(params) if params.curve == EllipticCurve::P256 => {
                SigningAlgorithm::Es256
            }
            AlgorithmParameters::RSA(_) => SigningAlgorithm::Rs256,
            _ => return None,
        };

        // A declared `alg` narrows the key to that algorithm. It has to agree
        // with the key type.
        match (&jwk.common.key_algorithm, family) {
            (None, family) => Some(family),
            (Some(KeyAlgorithm::ES256), SigningAlgorithm::Es256) => Some(family),
            (Some(KeyAlgorithm::RS256), SigningAlgorithm::Rs256) => Some(family),
            (Some(_), _) => None,
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningAlgorithm::Es256 => f.write_str("ES256"),
            SigningAlgorithm::Rs256 => f.write_str("RS256"),
        }
    }
}

/// A verification key taken from the key set.
#[derive(Clone)]
pub struct PublicKey {
    pub(crate) algorithm: SigningAlgorithm,
    pub(crate) decoding_key: DecodingKey,
}

impl PublicKey {
    /// The only algorithm this key verifies.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// A JWKS document whose entries are decoded one by one.
#[derive(Deserialize)]
struct RawKeySet {
    keys: Vec<Value>,
}

/// Public keys indexed by key id.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, PublicKey>,
}

impl KeySet {
    /// Parses a JWKS document.
    ///
    /// Entries that are not a JWK we understand, lack a `kid`, are of an
    /// unsupported key type, or whose declared `alg` disagrees with the key
    /// type are skipped.
    ///
    /// # Errors
    /// - the body is not a JSON object with a `keys` array
    pub fn parse(body: &str) -> Result<Self> {
        let raw: RawKeySet = serde_json::from_str(body).map_err(Error::KeySetParse)?;

        let mut keys = HashMap::with_capacity(raw.keys.len());
        for entry in raw.keys {
            let kid = entry
                .get("kid")
                .and_then(Value::as_str)
                .map(str::to_string);
            let jwk: Jwk = match serde_json::from_value(entry) {
                Ok(jwk) => jwk,
                Err(err) => {
                    warn!(kid = ?kid, error = %err, "skipping unrecognized jwk");
                    continue;
                }
            };
            let Some(kid) = kid else {
                warn!("skipping jwk without kid");
                continue;
            };
            let Some(algorithm) = SigningAlgorithm::for_jwk(&jwk) else {
                warn!(kid = %kid, "skipping jwk with unsupported key type or algorithm");
                continue;
            };
            let decoding_key = match DecodingKey::from_jwk(&jwk) {
                Ok(key) => key,
                Err(err) => {
                    warn!(kid = %kid, error = %err, "skipping jwk with invalid key parameters");
                    continue;
                }
            };
            keys.insert(
                kid,
                PublicKey {
                    algorithm,
                    decoding_key,
                },
            );
        }

        Ok(Self { keys })
    }

    /// Returns the key for `kid`.
    pub fn get(&self, kid: &str) -> Option<&PublicKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates over the key ids in the set.
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

/// Fetches and parses the key set published at `url`.
///
/// # Errors
/// - the request fails at the network level
/// - the endpoint answers with a non-success status
/// - the body is not a key set
#[instrument(skip(transport), err)]
pub async fn fetch_key_set<T>(transport: &T, url: &str) -> Result<KeySet>
where
    T: HttpTransport + ?Sized,
{
    let response = transport
        .get(url, &[(ACCEPT.as_str(), "application/json")])
        .await
        .map_err(Error::Transport)?;

    if !response.status.is_success() {
        return Err(Error::KeySetFetch {
            status: response.status,
            body: response.body,
        });
    }

    let key_set = KeySet::parse(&response.body)?;
    debug!(keys = key_set.len(), "fetched key set");
    Ok(key_set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockHttpTransport};
    use http::StatusCode;
    use rstest::rstest;
    use serde_json::json;
    use testutils::{RSA_KEY_ID, SIGNING_KEY_ID, fixture_ec_jwk, fixture_jwks_body};

    const URL: &str = "https://appleid.apple.com/auth/keys";

    #[test]
    fn test_parse_fixture_key_set() {
        let key_set = KeySet::parse(&fixture_jwks_body()).unwrap();

        assert_eq!(key_set.len(), 2);
        assert_eq!(
            key_set.get(SIGNING_KEY_ID).map(PublicKey::algorithm),
            Some(SigningAlgorithm::Es256)
        );
        assert_eq!(
            key_set.get(RSA_KEY_ID).map(PublicKey::algorithm),
            Some(SigningAlgorithm::Rs256)
        );
        assert!(!key_set.contains("missing"));
    }

    #[rstest]
    #[case::not_json("Invalid Data")]
    #[case::empty("")]
    #[case::array("[]")]
    #[case::missing_keys(r#"{"foo":"bar"}"#)]
    #[case::keys_not_array(r#"{"keys":"nope"}"#)]
    fn test_parse_invalid_body(#[case] body: &str) {
        let got = KeySet::parse(body);

        assert!(matches!(got, Err(Error::KeySetParse(_))), "{got:?}");
    }

    #[rstest]
    #[case::no_kid({
        let mut jwk = fixture_ec_jwk();
        jwk.as_object_mut().unwrap().remove("kid");
        jwk
    })]
    #[case::symmetric(json!({"kty": "oct", "kid": "hmac", "k": "c2VjcmV0"}))]
    #[case::alg_disagrees_with_key_type({
        let mut jwk = fixture_ec_jwk();
        jwk["alg"] = json!("RS256");
        jwk
    })]
    #[case::unknown_kty(json!({"kty": "foo", "kid": "future"}))]
    #[case::unknown_alg({
        let mut jwk = fixture_ec_jwk();
        jwk["kid"] = json!("secp256k1");
        jwk["alg"] = json!("ES256K");
        jwk
    })]
    #[case::not_an_object(json!("nope"))]
    fn test_parse_skips_unusable_keys(#[case] jwk: serde_json::Value) {
        let body = json!({ "keys": [fixture_ec_jwk(), jwk] }).to_string();

        let key_set = KeySet::parse(&body).unwrap();

        assert_eq!(key_set.kids().collect::<Vec<_>>(), vec![SIGNING_KEY_ID]);
    }

    #[test]
    fn test_parse_key_without_declared_alg() {
        let mut jwk = fixture_ec_jwk();
        jwk.as_object_mut().unwrap().remove("alg");
        let body = json!({ "keys": [jwk] }).to_string();

        let key_set = KeySet::parse(&body).unwrap();

        assert_eq!(key_set.kids().collect::<Vec<_>>(), vec![SIGNING_KEY_ID]);
    }

    #[tokio::test]
    async fn test_fetch_key_set() {
        let transport = MockHttpTransport::default();
        transport
            .get
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(StatusCode::OK, fixture_jwks_body())));

        let key_set = fetch_key_set(&transport, URL).await.unwrap();

        assert_eq!(key_set.len(), 2);
        assert_eq!(transport.get_calls(), 1);
        let args = transport.get_args();
        assert!(args[0].contains(URL));
        assert!(args[0].contains(r#"("accept", "application/json")"#));
    }

    #[tokio::test]
    async fn test_fetch_key_set_server_error() {
        let transport = MockHttpTransport::default();
        transport.get.lock().unwrap().push_back(Ok(HttpResponse::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )));

        let got = fetch_key_set(&transport, URL).await;

        match got {
            Err(Error::KeySetFetch { status, body }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "Internal Server Error");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_key_set_invalid_body() {
        let transport = MockHttpTransport::default();
        transport
            .get
            .lock()
            .unwrap()
            .push_back(Ok(HttpResponse::new(StatusCode::OK, "Invalid Data")));

        let got = fetch_key_set(&transport, URL).await;

        assert!(matches!(got, Err(Error::KeySetParse(_))), "{got:?}");
    }

    #[tokio::test]
    async fn test_fetch_key_set_transport_error() {
        let transport = MockHttpTransport::default();
        transport
            .get
            .lock()
            .unwrap()
            .push_back(Err("connection refused".into()));

        let got = fetch_key_set(&transport, URL).await;

        match got {
            Err(Error::Transport(err)) => assert_eq!(err.to_string(), "connection refused"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
