//! Bearer token sources.

use std::future::Future;

use async_trait::async_trait;

use crate::error::ClientError;

/// Supplies a bearer token for each (re)connect attempt.
///
/// The manager never caches the result; the factory is asked again on every
/// attempt so it can refresh expired credentials.
#[async_trait]
pub trait TokenFactory: Send + Sync {
    async fn token(&self) -> Result<String, ClientError>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl TokenFactory for StaticToken {
    async fn token(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }
}

#[async_trait]
impl<F, Fut> TokenFactory for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, ClientError>> + Send,
{
    async fn token(&self) -> Result<String, ClientError> {
        (self)().await
    }
}
