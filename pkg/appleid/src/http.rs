use async_trait::async_trait;
use http::StatusCode;
use reqwest::{
    Client,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    redirect::Policy,
};

use crate::error::{BoxError, Error};

/// A response as seen by the token pipeline: status plus raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The HTTP capabilities the client needs from its transport.
///
/// Errors returned here are network level failures only. Non-success statuses
/// are regular responses.
#[cfg_attr(test, mock::async_client)]
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    /// Issues a GET request.
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, BoxError>;

    /// Issues a POST request with a `application/x-www-form-urlencoded` body.
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, BoxError>;
}

/// [`HttpTransport`] backed by [`reqwest`].
///
/// Redirects are never followed.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Creates a new [`ReqwestTransport`].
    ///
    /// # Errors
    /// - the underlying client cannot be built (e.g. TLS backend failure)
    pub fn new() -> Result<Self, Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .build()
            .map_err(Error::BuildHttpClient)?;
        Ok(Self { client })
    }

    /// Wraps an existing client. Timeouts configured on it apply to every call.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(request: reqwest::RequestBuilder) -> Result<HttpResponse, BoxError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, BoxError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::send(request).await
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<HttpResponse, BoxError> {
        let body = serde_urlencoded::to_string(form)?;

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CONTENT_LENGTH, body.len().to_string());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::send(request.body(body)).await
    }
}
