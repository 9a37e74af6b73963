//! HTTP implementation of the remote adapters.

use crate::actions::{AuthResponse, SignInRequest, SignUpRequest};
use crate::config::ClientConfig;
use crate::error::TransportError;
use crate::providers::{AuthService, TodoService};
use crate::state::{Todo, TodoId};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Default remote service
pub const DEFAULT_BASE_URL: &str = "https://todos.simpleapi.dev/api";

#[derive(Serialize)]
struct DescriptionBody<'a> {
    description: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// JSON-over-HTTP client for the to-do and auth endpoints.
///
/// | Call | Request |
/// |------|---------|
/// | `list` | `GET /todos` |
/// | `create` | `POST /todos {description}` |
/// | `update` | `PUT /todos/{id} {description}` |
/// | `delete` | `DELETE /todos/{id}` |
/// | `sign_up` | `POST /users/register {name, email, password}` |
/// | `sign_in` | `POST /users/login {email, password}` |
///
/// When an API key is set it is sent as the `apikey` query parameter.
#[derive(Clone)]
pub struct HttpService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpService")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl HttpService {
    /// Client for `base_url` without an API key
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Client reusing an existing `reqwest` client
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Client built from configuration, with its request timeout
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the TLS backend cannot be
    /// initialized.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let service = Self::with_client(client, config.base_url.clone());
        Ok(match &config.api_key {
            Some(key) => service.with_api_key(key.clone()),
            None => service,
        })
    }

    /// Sends `key` with every request
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Base URL without trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url));
        match &self.api_key {
            Some(key) => builder.query(&[("apikey", key)]),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> Result<Response, TransportError> {
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.message);
        tracing::debug!(status = status.as_u16(), ?message, "Request rejected");
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, TransportError> {
        Self::send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl TodoService for HttpService {
    fn list(&self) -> impl Future<Output = Result<Vec<Todo>, TransportError>> + Send {
        Self::json(self.request(Method::GET, "/todos"))
    }

    fn create(
        &self,
        description: &str,
    ) -> impl Future<Output = Result<Todo, TransportError>> + Send {
        Self::json(
            self.request(Method::POST, "/todos")
                .json(&DescriptionBody { description }),
        )
    }

    fn update(
        &self,
        id: TodoId,
        description: &str,
    ) -> impl Future<Output = Result<Todo, TransportError>> + Send {
        Self::json(
            self.request(Method::PUT, &format!("/todos/{id}"))
                .json(&DescriptionBody { description }),
        )
    }

    fn delete(&self, id: TodoId) -> impl Future<Output = Result<TodoId, TransportError>> + Send {
        let builder = self.request(Method::DELETE, &format!("/todos/{id}"));
        async move {
            Self::send(builder).await?;
            Ok(id)
        }
    }
}

impl AuthService for HttpService {
    fn sign_up(
        &self,
        request: &SignUpRequest,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send {
        Self::json(self.request(Method::POST, "/users/register").json(request))
    }

    fn sign_in(
        &self,
        request: &SignInRequest,
    ) -> impl Future<Output = Result<AuthResponse, TransportError>> + Send {
        Self::json(self.request(Method::POST, "/users/login").json(request))
    }
}
