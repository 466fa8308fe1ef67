//! Provider registry and factory
//!
//! Maps provider names to constructor functions and resolves credentials
//! through an optional [`KeyResolver`] collaborator when the caller
//! supplies none. The registry is an explicitly-constructed value meant
//! to be shared behind `Arc`; there is no process-wide global, so tests
//! can hold independent registries.

use crate::config::SecretString;
use crate::providers::adapter::ChatProvider;
use crate::providers::error::{ProviderResult, UniInferError};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Extra construction parameters a provider may need beyond the API key
/// (a local base URL, a Cloudflare account id, vendor knobs).
#[derive(Debug, Clone, Default)]
pub struct ProviderParams {
    /// Override the provider's default endpoint
    pub base_url: Option<String>,

    /// Account identifier, for account-scoped APIs
    pub account_id: Option<String>,

    /// Remaining vendor-specific parameters
    pub extra: HashMap<String, Value>,
}

impl ProviderParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the account identifier
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Add a vendor-specific parameter
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Constructor function producing a fresh adapter instance
pub type ProviderCtor = Arc<
    dyn Fn(Option<SecretString>, &ProviderParams) -> ProviderResult<Box<dyn ChatProvider>>
        + Send
        + Sync,
>;

/// External credential collaborator queried when no explicit key is
/// supplied. Failures surface as [`UniInferError::Authentication`], never
/// as a crash.
pub trait KeyResolver: Send + Sync {
    /// Look up the API key for a provider
    fn get_api_key(&self, provider: &str) -> ProviderResult<SecretString>;
}

/// [`KeyResolver`] backed by `<PROVIDER>_API_KEY` environment variables
/// (`OPENAI_API_KEY`, `OPENROUTER_API_KEY`, ...).
pub struct EnvKeyResolver;

impl KeyResolver for EnvKeyResolver {
    fn get_api_key(&self, provider: &str) -> ProviderResult<SecretString> {
        let var = format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"));
        std::env::var(&var)
            .map(SecretString::new)
            .map_err(|_| {
                UniInferError::Authentication(format!(
                    "environment variable {var} not set for provider '{provider}'"
                ))
            })
    }
}

#[derive(Clone)]
struct Registration {
    needs_api_key: bool,
    ctor: ProviderCtor,
}

/// Name-to-constructor registry for provider adapters.
///
/// Registrations are last-write-wins; there is no removal. Every `get`
/// constructs a fresh adapter; callers wanting reuse hold the returned
/// instance themselves.
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Registration>>,
    resolver: Option<Arc<dyn KeyResolver>>,
}

impl ProviderRegistry {
    /// Create an empty registry with no key resolver
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            resolver: None,
        }
    }

    /// Create a registry pre-populated with every provider enabled at
    /// build time
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        crate::providers::register_builtin(&registry);
        registry
    }

    /// Attach a credential resolver consulted when `get` is called
    /// without an explicit key
    pub fn with_resolver(mut self, resolver: Arc<dyn KeyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Insert or overwrite a provider registration.
    ///
    /// `needs_api_key` controls whether key resolution is attempted for
    /// this provider; purely local backends register with `false`.
    pub fn register(&self, name: impl Into<String>, needs_api_key: bool, ctor: ProviderCtor) {
        let name = name.into();
        debug!(provider = %name, needs_api_key, "registering provider");
        self.providers
            .write()
            .unwrap()
            .insert(name, Registration { needs_api_key, ctor });
    }

    /// Construct the named provider, resolving credentials if needed
    pub fn get(&self, name: &str) -> ProviderResult<Box<dyn ChatProvider>> {
        self.get_with(name, None, &ProviderParams::default())
    }

    /// Construct the named provider with an explicit API key
    pub fn get_with_key(
        &self,
        name: &str,
        api_key: impl Into<SecretString>,
    ) -> ProviderResult<Box<dyn ChatProvider>> {
        self.get_with(name, Some(api_key.into()), &ProviderParams::default())
    }

    /// Construct the named provider with full control over key and
    /// extra parameters.
    ///
    /// When `api_key` is `None` and the registration needs one, the
    /// configured [`KeyResolver`] is consulted; a missing resolver or a
    /// resolution failure surfaces as [`UniInferError::Authentication`].
    pub fn get_with(
        &self,
        name: &str,
        api_key: Option<SecretString>,
        params: &ProviderParams,
    ) -> ProviderResult<Box<dyn ChatProvider>> {
        let registration = self
            .providers
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| UniInferError::NotRegistered(name.to_string()))?;

        let api_key = match api_key {
            Some(key) => Some(key),
            None if registration.needs_api_key => Some(self.resolve_key(name)?),
            None => None,
        };

        (registration.ctor)(api_key, params)
    }

    /// Registered provider names, sorted for stability within a run
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve_key(&self, name: &str) -> ProviderResult<SecretString> {
        let resolver = self.resolver.as_ref().ok_or_else(|| {
            UniInferError::Authentication(format!(
                "no API key supplied for '{name}' and no key resolver configured"
            ))
        })?;
        resolver.get_api_key(name).map_err(|err| {
            UniInferError::Authentication(format!("failed to resolve API key for '{name}': {err}"))
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject construction without a key.
///
/// The registry already resolves keys for registrations marked
/// `needs_api_key`; this guards constructors invoked through custom
/// registrations that skipped the flag.
pub(crate) fn require_key(
    provider: &str,
    api_key: Option<SecretString>,
) -> ProviderResult<SecretString> {
    api_key.ok_or_else(|| {
        UniInferError::Authentication(format!("{provider}: API key is required"))
    })
}
