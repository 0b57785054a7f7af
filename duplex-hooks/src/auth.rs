//! Bearer-token authentication hook.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use duplex_core::error::{McpError, McpResult};
use duplex_core::hook::{PreDispatchHook, RequestContext};
use serde_json::Value;
use tracing::debug;

/// Validates a presented token when the static key set does not.
pub type TokenValidator = dyn Fn(&str) -> bool + Send + Sync;

/// Configuration for [`AuthHook`].
pub struct AuthConfig {
    api_keys: HashSet<String>,
    allow_anonymous: bool,
    custom_validator: Option<Arc<TokenValidator>>,
}

impl AuthConfig {
    /// An empty configuration: no keys, anonymous refused.
    pub fn new() -> Self {
        Self {
            api_keys: HashSet::new(),
            allow_anonymous: false,
            custom_validator: None,
        }
    }

    /// Accept this API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.insert(key.into());
        self
    }

    /// Accept every key in the iterator.
    pub fn api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Permit requests that present no credentials at all.
    pub fn allow_anonymous(mut self) -> Self {
        self.allow_anonymous = true;
        self
    }

    /// Delegate tokens the key set does not recognize to a custom check.
    pub fn custom_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.custom_validator = Some(Arc::new(validator));
        self
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_keys", &self.api_keys.len())
            .field("allow_anonymous", &self.allow_anonymous)
            .field("custom_validator", &self.custom_validator.is_some())
            .finish()
    }
}

/// Pre-dispatch hook that authenticates requests by bearer token.
///
/// The token travels in the request context's `authorization` metadata
/// field, with or without the `Bearer ` prefix. With `allow_anonymous` set,
/// requests presenting no credentials pass; presented credentials are always
/// checked.
pub struct AuthHook {
    config: AuthConfig,
}

impl AuthHook {
    /// Create the hook from its configuration.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    fn check_token(&self, token: &str) -> bool {
        if self.config.api_keys.contains(token) {
            return true;
        }
        match &self.config.custom_validator {
            Some(validator) => validator(token),
            None => false,
        }
    }
}

#[async_trait]
impl PreDispatchHook for AuthHook {
    fn name(&self) -> &str {
        "auth"
    }

    async fn before_dispatch(
        &self,
        method: &str,
        _params: Option<&Value>,
        context: &RequestContext,
    ) -> McpResult<()> {
        let Some(credential) = context.metadata_str("authorization") else {
            if self.config.allow_anonymous {
                return Ok(());
            }
            debug!(method, "refusing request without credentials");
            return Err(McpError::permission_denied("missing credentials"));
        };

        let token = credential.strip_prefix("Bearer ").unwrap_or(credential);
        if self.check_token(token) {
            Ok(())
        } else {
            debug!(method, "refusing request with invalid credentials");
            Err(McpError::permission_denied("invalid credentials"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_token(token: &str) -> RequestContext {
        RequestContext::new().with_metadata("authorization", Value::String(token.to_string()))
    }

    #[tokio::test]
    async fn known_key_is_accepted() {
        let hook = AuthHook::new(AuthConfig::new().api_key("k1"));
        let context = context_with_token("Bearer k1");
        assert!(hook.before_dispatch("tools/list", None, &context).await.is_ok());
    }

    #[tokio::test]
    async fn bare_token_without_prefix_is_accepted() {
        let hook = AuthHook::new(AuthConfig::new().api_key("k1"));
        let context = context_with_token("k1");
        assert!(hook.before_dispatch("tools/list", None, &context).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_key_is_refused() {
        let hook = AuthHook::new(AuthConfig::new().api_key("k1"));
        let context = context_with_token("Bearer nope");
        let err = hook
            .before_dispatch("tools/list", None, &context)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::PermissionDenied { .. }));
        assert_eq!(err.code(), -32003);
    }

    #[tokio::test]
    async fn missing_credentials_refused_by_default() {
        let hook = AuthHook::new(AuthConfig::new().api_key("k1"));
        let context = RequestContext::new();
        let err = hook
            .before_dispatch("tools/list", None, &context)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn anonymous_allowed_when_configured() {
        let hook = AuthHook::new(AuthConfig::new().allow_anonymous());
        let context = RequestContext::new();
        assert!(hook.before_dispatch("tools/list", None, &context).await.is_ok());
    }

    #[tokio::test]
    async fn anonymous_config_still_checks_presented_credentials() {
        let hook = AuthHook::new(AuthConfig::new().allow_anonymous().api_key("k1"));
        let context = context_with_token("Bearer wrong");
        assert!(hook
            .before_dispatch("tools/list", None, &context)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn custom_validator_gets_unmatched_tokens() {
        let hook = AuthHook::new(
            AuthConfig::new().custom_validator(|token| token.starts_with("tenant-")),
        );
        let good = context_with_token("Bearer tenant-42");
        let bad = context_with_token("Bearer guest");
        assert!(hook.before_dispatch("tools/list", None, &good).await.is_ok());
        assert!(hook.before_dispatch("tools/list", None, &bad).await.is_err());
    }
}
