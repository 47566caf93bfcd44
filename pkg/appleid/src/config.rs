//! Client configuration.
//!
//! A [`Config`] is built once from named settings and never changes afterwards.
//! Unknown setting names are rejected when the config is built.
use std::{collections::HashMap, fmt, str::FromStr};

use crate::error::ConfigKeyError;

/// Apple's JWKS endpoint.
pub const APPLE_KEYS_ENDPOINT: &str = "https://appleid.apple.com/auth/keys";
/// Apple's token endpoint.
pub const APPLE_TOKEN_ENDPOINT: &str = "https://appleid.apple.com/auth/token";
/// Apple's authorization endpoint.
pub const APPLE_AUTH_ENDPOINT: &str = "https://appleid.apple.com/auth/authorize";

const DEFAULT_SCOPES: &str = "name email";

/// Recognized configuration settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// The services id (or bundle id) registered with Apple.
    ClientId,
    /// The `.p8` private key contents, or a path to the file.
    PrivateKey,
    /// The id of the private key.
    KeyId,
    /// The Apple developer team id.
    TeamId,
    RedirectUri,
    DefaultScopes,
    ApiKeysEndpoint,
    ApiTokenEndpoint,
    ApiAuthEndpoint,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::ClientId,
        ConfigKey::PrivateKey,
        ConfigKey::KeyId,
        ConfigKey::TeamId,
        ConfigKey::RedirectUri,
        ConfigKey::DefaultScopes,
        ConfigKey::ApiKeysEndpoint,
        ConfigKey::ApiTokenEndpoint,
        ConfigKey::ApiAuthEndpoint,
    ];

    /// The setting name accepted by [`Config::new`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::ClientId => "clientId",
            ConfigKey::PrivateKey => "privateKey",
            ConfigKey::KeyId => "keyId",
            ConfigKey::TeamId => "teamId",
            ConfigKey::RedirectUri => "redirectUri",
            ConfigKey::DefaultScopes => "defaultScopes",
            ConfigKey::ApiKeysEndpoint => "apiKeysEndpoint",
            ConfigKey::ApiTokenEndpoint => "apiTokenEndpoint",
            ConfigKey::ApiAuthEndpoint => "apiAuthEndpoint",
        }
    }

    /// The environment variable read by [`Config::from_env`].
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::ClientId => "APPLE_CLIENT_ID",
            ConfigKey::PrivateKey => "APPLE_PRIVATE_KEY",
            ConfigKey::KeyId => "APPLE_KEY_ID",
            ConfigKey::TeamId => "APPLE_TEAM_ID",
            ConfigKey::RedirectUri => "APPLE_REDIRECT_URI",
            ConfigKey::DefaultScopes => "APPLE_DEFAULT_SCOPES",
            ConfigKey::ApiKeysEndpoint => "APPLE_KEYS_ENDPOINT",
            ConfigKey::ApiTokenEndpoint => "APPLE_TOKEN_ENDPOINT",
            ConfigKey::ApiAuthEndpoint => "APPLE_AUTH_ENDPOINT",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigKeyError::Unknown(s.to_string()))
    }
}

/// Immutable Sign in with Apple settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    values: HashMap<ConfigKey, String>,
}

impl Config {
    /// Creates a config from `(name, value)` pairs on top of the defaults.
    ///
    /// # Errors
    /// - a name is not a recognized setting
    pub fn new<I, K, V>(entries: I) -> Result<Self, ConfigKeyError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (name, value) in entries {
            let key = name.as_ref().parse::<ConfigKey>()?;
            config.values.insert(key, value.into());
        }
        Ok(config)
    }

    /// Creates a config from `APPLE_*` environment variables.
    ///
    /// Variables that are not set keep their default (or stay unset).
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for key in ConfigKey::ALL {
            if let Some(value) = lookup(key.env_var()) {
                config.values.insert(key, value);
            }
        }
        config
    }

    /// Returns the value of a setting.
    ///
    /// # Errors
    /// - the setting has no default and was not provided
    pub fn get(&self, key: ConfigKey) -> Result<&str, ConfigKeyError> {
        self.values
            .get(&key)
            .map(String::as_str)
            .ok_or(ConfigKeyError::Unset(key))
    }
}

impl Default for Config {
    fn default() -> Self {
        let values = HashMap::from([
            (ConfigKey::DefaultScopes, DEFAULT_SCOPES.to_string()),
            (ConfigKey::ApiKeysEndpoint, APPLE_KEYS_ENDPOINT.to_string()),
            (ConfigKey::ApiTokenEndpoint, APPLE_TOKEN_ENDPOINT.to_string()),
            (ConfigKey::ApiAuthEndpoint, APPLE_AUTH_ENDPOINT.to_string()),
        ]);
        Self { values }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in ConfigKey::ALL {
            match (key, self.values.get(&key)) {
                (_, None) => {}
                (ConfigKey::PrivateKey, Some(_)) => {
                    map.entry(&key.as_str(), &"<redacted>");
                }
                (_, Some(value)) => {
                    map.entry(&key.as_str(), value);
                }
            }
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::scopes(ConfigKey::DefaultScopes, "name email")]
    #[case::keys_endpoint(ConfigKey::ApiKeysEndpoint, APPLE_KEYS_ENDPOINT)]
    #[case::token_endpoint(ConfigKey::ApiTokenEndpoint, APPLE_TOKEN_ENDPOINT)]
    #[case::auth_endpoint(ConfigKey::ApiAuthEndpoint, APPLE_AUTH_ENDPOINT)]
    fn test_defaults(#[case] key: ConfigKey, #[case] want: &str) {
        let config = Config::new([("clientId", "com.example.app")]).unwrap();

        assert_eq!(config.get(key), Ok(want));
    }

    #[test]
    fn test_override_default() {
        let config = Config::new([
            ("defaultScopes", "email"),
            ("apiKeysEndpoint", "http://localhost/keys"),
        ])
        .unwrap();

        assert_eq!(config.get(ConfigKey::DefaultScopes), Ok("email"));
        assert_eq!(
            config.get(ConfigKey::ApiKeysEndpoint),
            Ok("http://localhost/keys")
        );
    }

    #[rstest]
    #[case::unknown("clientSecret")]
    #[case::wrong_case("ClientId")]
    #[case::empty("")]
    fn test_unknown_key(#[case] name: &str) {
        let got = Config::new([("clientId", "com.example.app"), (name, "value")]);

        assert_eq!(got, Err(ConfigKeyError::Unknown(name.to_string())));
        assert_eq!(
            got.unwrap_err().to_string(),
            format!("{name} is not a valid config value")
        );
    }

    #[test]
    fn test_unset_key() {
        let config = Config::new(Vec::<(&str, &str)>::new()).unwrap();

        let got = config.get(ConfigKey::TeamId);

        assert_eq!(got, Err(ConfigKeyError::Unset(ConfigKey::TeamId)));
        assert_eq!(got.unwrap_err().to_string(), "config value 'teamId' is not set");
    }

    #[test]
    fn test_every_key_round_trips_through_its_name() {
        for key in ConfigKey::ALL {
            assert_eq!(key.as_str().parse::<ConfigKey>(), Ok(key));
        }
    }

    #[test]
    fn test_from_lookup() {
        let env = HashMap::from([
            ("APPLE_CLIENT_ID", "com.example.app"),
            ("APPLE_TEAM_ID", "TEAM123"),
            ("APPLE_TOKEN_ENDPOINT", "http://localhost/token"),
        ]);

        let config = Config::from_lookup(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.get(ConfigKey::ClientId), Ok("com.example.app"));
        assert_eq!(config.get(ConfigKey::TeamId), Ok("TEAM123"));
        assert_eq!(
            config.get(ConfigKey::ApiTokenEndpoint),
            Ok("http://localhost/token")
        );
        assert_eq!(config.get(ConfigKey::DefaultScopes), Ok("name email"));
        assert!(config.get(ConfigKey::KeyId).is_err());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let config = Config::new([("privateKey", "super-secret"), ("keyId", "KEY123")]).unwrap();

        let debug = format!("{config:?}");

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("KEY123"));
    }
}
