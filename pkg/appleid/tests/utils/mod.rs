use appleid::{AppleIdClient, Config, ReqwestTransport};
use common::mock::MockNow;
use testutils::SIGNING_KEY_PEM;
use wiremock::MockServer;

pub(crate) type TestClient = AppleIdClient<ReqwestTransport, MockNow>;

pub(crate) const KEYS_PATH: &str = "/auth/keys";
pub(crate) const TOKEN_PATH: &str = "/auth/token";

/// A client whose Apple endpoints point at `server`.
pub(crate) fn client_for(server: &MockServer) -> TestClient {
    let keys_endpoint = format!("{}{KEYS_PATH}", server.uri());
    let token_endpoint = format!("{}{TOKEN_PATH}", server.uri());
    let config = Config::new([
        ("clientId", "com.example.app"),
        ("teamId", "TEAM123456"),
        ("keyId", "KEY1234567"),
        ("privateKey", SIGNING_KEY_PEM),
        ("redirectUri", "https://example.com/callback"),
        ("apiKeysEndpoint", keys_endpoint.as_str()),
        ("apiTokenEndpoint", token_endpoint.as_str()),
    ])
    .expect("fixture config must be valid");

    let transport = ReqwestTransport::new().expect("failed to build http client");
    TestClient::with_transport(transport, config)
}
