use url::form_urlencoded;

use crate::{
    config::{Config, ConfigKey},
    error::Result,
};

/// Constructs the Sign in with Apple authorization URL.
///
/// The query parameters always appear in the same order, so the same inputs
/// produce the same URL byte for byte. `state` is posted back to the redirect
/// uri together with the authorization code.
///
/// # Errors
/// - `clientId` or `redirectUri` is not configured
pub fn build_authorize_url(state: &str, config: &Config) -> Result<String> {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("response_type", "code id_token")
        .append_pair("response_mode", "form_post")
        .append_pair("client_id", config.get(ConfigKey::ClientId)?)
        .append_pair("redirect_uri", config.get(ConfigKey::RedirectUri)?)
        .append_pair("state", state)
        .append_pair("scope", config.get(ConfigKey::DefaultScopes)?)
        .finish();

    Ok(format!(
        "{}?{query}",
        config.get(ConfigKey::ApiAuthEndpoint)?
    ))
}
