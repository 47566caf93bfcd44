use base64::{Engine as _, prelude::BASE64_URL_SAFE_NO_PAD};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Result of exchanging an authorization code at Apple's token endpoint.
///
/// Every field is optional since Apple omits some of them depending on the
/// grant. Unknown fields are ignored, fields of an unexpected JSON type read
/// as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub expires_in: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub id_token: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Audience of an identity token. Apple sends a single client id, the JWT
/// format also allows a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(aud) => Some(Audience::Single(aud.clone())),
            Value::Array(values) => Some(Audience::Multiple(
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Whether `client_id` is one of the audiences.
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == client_id,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }
}

/// Claims of an identity token whose signature and lifetime were verified.
///
/// Absent claims read as `None`, absent flags as `false`. The full payload
/// stays available through [`VerifiedClaims::claims`].
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedClaims {
    issuer: Option<String>,
    audience: Option<Audience>,
    issued_at: Option<i64>,
    expiry: Option<i64>,
    subject: Option<String>,
    access_token_hash: Option<String>,
    code_hash: Option<String>,
    email: Option<String>,
    email_verified: bool,
    is_private_email: bool,
    auth_time: Option<i64>,
    nonce_supported: bool,
    claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Maps a decoded payload. Claims of an unexpected JSON type read as absent.
    pub fn from_claims(claims: Map<String, Value>) -> Self {
        let string = |name: &str| claims.get(name).and_then(Value::as_str).map(str::to_string);
        let number = |name: &str| numeric_claim(&claims, name);
        let flag = |name: &str| claims.get(name).is_some_and(is_true);

        Self {
            issuer: string("iss"),
            audience: claims.get("aud").and_then(Audience::from_value),
            issued_at: number("iat"),
            expiry: number("exp"),
            subject: string("sub"),
            access_token_hash: string("at_hash"),
            code_hash: string("c_hash"),
            email: string("email"),
            email_verified: flag("email_verified"),
            is_private_email: flag("is_private_email"),
            auth_time: number("auth_time"),
            nonce_supported: flag("nonce_supported"),
            claims,
        }
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience(&self) -> Option<&Audience> {
        self.audience.as_ref()
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }

    pub fn expiry(&self) -> Option<i64> {
        self.expiry
    }

    /// The stable, team scoped Apple user id.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn access_token_hash(&self) -> Option<&str> {
        self.access_token_hash.as_deref()
    }

    pub fn code_hash(&self) -> Option<&str> {
        self.code_hash.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn email_verified(&self) -> bool {
        self.email_verified
    }

    /// Whether the email is an Apple private relay address.
    pub fn is_private_email(&self) -> bool {
        self.is_private_email
    }

    pub fn auth_time(&self) -> Option<i64> {
        self.auth_time
    }

    pub fn nonce_supported(&self) -> bool {
        self.nonce_supported
    }

    /// The unmodified decoded payload.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// Checks the `at_hash` claim against an access token.
    ///
    /// Returns `false` when the claim is absent.
    pub fn matches_access_token(&self, access_token: &str) -> bool {
        self.access_token_hash() == Some(left_half_hash(access_token).as_str())
    }

    /// Checks the `c_hash` claim against the authorization code delivered
    /// alongside the identity token.
    ///
    /// Returns `false` when the claim is absent.
    pub fn matches_code(&self, code: &str) -> bool {
        self.code_hash() == Some(left_half_hash(code).as_str())
    }
}

/// Reads a NumericDate claim. Fractional seconds are truncated.
pub(crate) fn numeric_claim(claims: &Map<String, Value>, name: &str) -> Option<i64> {
    let value = claims.get(name)?;
    value.as_i64().or_else(|| value.as_f64().map(|secs| secs as i64))
}

/// Apple encodes flags either as JSON booleans or as the strings "true" and
/// "false".
fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(flag) => flag == "true",
        _ => false,
    }
}

/// OpenID Connect token hash: base64url of the left half of the SHA-256 digest.
fn left_half_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}
