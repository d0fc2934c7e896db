//! `reqwest` middleware that authenticates requests with a bearer token.
use async_trait::async_trait;
use reqwest::{header::HeaderValue, Request, Response};
use reqwest_middleware::{Middleware, Next};

/// `reqwest` middleware that adds an `Authorization: Bearer <token>` header to every request that
/// does not carry an `Authorization` header yet.
#[derive(Clone)]
pub struct BearerTokenMiddleware {
    token: String,
}

impl std::fmt::Debug for BearerTokenMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerTokenMiddleware")
            .field("token", &crate::DEFAULT_REDACTION_STR)
            .finish()
    }
}

#[async_trait]
impl Middleware for BearerTokenMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        // If an `Authorization` header is already present, don't authenticate
        if req.headers().get(reqwest::header::AUTHORIZATION).is_some() {
            return next.run(req, extensions).await;
        }

        let req = self.authenticate_request(req)?;
        next.run(req, extensions).await
    }
}

impl BearerTokenMiddleware {
    /// Create a new middleware that authenticates with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    fn authenticate_request(&self, mut req: Request) -> reqwest_middleware::Result<Request> {
        let mut header_value = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(reqwest_middleware::Error::middleware)?;
        header_value.set_sensitive(true);
        req.headers_mut()
            .insert(reqwest::header::AUTHORIZATION, header_value);
        Ok(req)
    }
}
