use std::fmt;

use crate::config::SecurityContextConfig;
use crate::credentials::CredentialManager;
use crate::expiry::Expiry;
use crate::negotiation::{ContextState, NegotiationEngine};
use crate::provider::SecurityProvider;
use crate::{ClientResponseFlags, CredentialUse, Result, SecurityPackageType};

/// Client side of a challenge/response handshake.
///
/// The client acquires outbound credentials when it is created and then produces one token per
/// [`get_client_token`](Self::get_client_token) call until the provider reports that the
/// security context is established:
///
/// ```text
/// token = client.get_client_token(None)?            // first leg
/// loop {
///     send token to the peer, receive its answer
///     token = client.get_client_token(Some(answer))?
///     if client.is_established() { send token if it is not empty, stop }
/// }
/// ```
///
/// Every provider call blocks the current thread. Async callers should run the handshake on a
/// blocking-friendly thread (e.g. `tokio::task::spawn_blocking`).
///
/// The context handle and the credentials handle are released by [`dispose`](Self::dispose) or
/// when the client is dropped, in this order.
pub struct SecurityContextClient<P: SecurityProvider + Clone> {
    // Field order matters: the context is deleted before the credentials it was created from.
    engine: NegotiationEngine<P>,
    credentials: CredentialManager<P>,
}

#[cfg(windows)]
impl SecurityContextClient<crate::winapi::Secur32> {
    /// Acquires the current user's outbound credentials for `package_name` (e.g. `"Negotiate"`).
    pub fn new(package_name: &str) -> Result<Self> {
        Self::with_provider(crate::winapi::Secur32, SecurityContextConfig::new(package_name))
    }

    pub fn with_config(config: SecurityContextConfig) -> Result<Self> {
        Self::with_provider(crate::winapi::Secur32, config)
    }
}

impl<P: SecurityProvider + Clone> SecurityContextClient<P> {
    pub fn with_provider(provider: P, config: SecurityContextConfig) -> Result<Self> {
        let credentials =
            CredentialManager::acquire(provider.clone(), config.package.clone(), CredentialUse::Outbound)?;
        let engine = NegotiationEngine::new(provider, &config);

        Ok(Self { engine, credentials })
    }

    /// Runs the next leg of the handshake. Pass `None` on the first leg and the peer's token on
    /// every following one.
    ///
    /// Both a completed and a continuing leg can produce a token that has to reach the peer.
    pub fn get_client_token(&mut self, server_token: Option<&[u8]>) -> Result<Vec<u8>> {
        self.engine.step(&mut self.credentials, server_token)
    }

    /// Expiration of the security context as reported by the most recent successful leg, or
    /// [`Expiry::NotAvailable`] before the first one.
    pub fn token_expiration(&self) -> Expiry {
        self.engine.expiry()
    }

    pub fn credentials_expiration(&self) -> Expiry {
        self.credentials.expiry()
    }

    pub fn state(&self) -> ContextState {
        self.engine.state()
    }

    pub fn is_established(&self) -> bool {
        self.engine.state() == ContextState::Established
    }

    pub fn context_flags(&self) -> ClientResponseFlags {
        self.engine.context_flags()
    }

    pub fn package(&self) -> &SecurityPackageType {
        self.credentials.package()
    }

    /// Releases the security context (if one was created) and the credentials.
    ///
    /// Equivalent to dropping the client.
    pub fn dispose(self) {
        debug!(package = %self.package(), state = ?self.state(), "disposing security context client");
    }
}

impl<P: SecurityProvider + Clone> fmt::Debug for SecurityContextClient<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityContextClient")
            .field("engine", &self.engine)
            .field("credentials", &self.credentials)
            .finish()
    }
}
