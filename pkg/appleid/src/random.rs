use base64::Engine as _;
use base64::prelude::BASE64_URL_SAFE_NO_PAD;
use rand::Rng;

/// A source of cryptographically secure random values.
///
/// Most users will not implement this directly, use [`SecureRandom`]
/// (the default) or a mock implementation for testing.
///
/// # Example
/// ```
/// use appleid::RandomSource;
///
/// struct MockRandom;
///
/// impl RandomSource for MockRandom {
///     fn base64_url(_len: usize) -> String {
///         "dGVzdA".to_string()
///     }
/// }
/// ```
pub trait RandomSource: Send + Sync + 'static {
    /// Returns a random base64-url string (no padding).
    fn base64_url(num_bytes: usize) -> String;
}

/// Default cryptographically secure random generator backed by the thread rng.
#[derive(Debug, Clone, Default)]
pub struct SecureRandom;

impl RandomSource for SecureRandom {
    fn base64_url(num_bytes: usize) -> String {
        let random_bytes: Vec<u8> = (0..num_bytes).map(|_| rand::rng().random()).collect();
        BASE64_URL_SAFE_NO_PAD.encode(&random_bytes)
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;

    /// Mock random generator for testing.
    #[derive(Debug, Default, Clone)]
    pub struct MockRandom;

    impl RandomSource for MockRandom {
        fn base64_url(_: usize) -> String {
            "secret-encoded".to_string()
        }
    }
}
