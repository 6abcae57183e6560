use std::{fmt, ptr};

use num_traits::ToPrimitive;

use crate::config::SecurityContextConfig;
use crate::credentials::CredentialManager;
use crate::expiry::Expiry;
use crate::provider::SecurityProvider;
use crate::security_buffer::{InputToken, OutputToken};
use crate::sspi_data_types::{SecHandle, SecWChar, SecurityStatus, TimeStamp, SEC_E_OK, SEC_I_CONTINUE_NEEDED};
use crate::utils::str_to_win_wstring;
use crate::{
    ClientRequestFlags, ClientResponseFlags, DataRepresentation, Error, ErrorType, NativeStatus, Result,
    SecurityPackageType,
};

/// Progress of a client-side handshake. States only move forward:
/// `NotStarted -> Negotiating -> {Established, Failed}`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ContextState {
    NotStarted,
    Negotiating,
    Established,
    Failed,
}

impl ContextState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ContextState::Established | ContextState::Failed)
    }
}

/// Result of one leg as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegOutcome {
    /// The context is established. The token may still have to be sent to the peer.
    Done(Vec<u8>),
    /// The peer has to answer the token before the next leg.
    Continue(Vec<u8>),
    Failed(NativeStatus),
}

impl LegOutcome {
    /// Classifies a provider status. `token` is only read for successful statuses.
    pub fn from_status(status: SecurityStatus, token: impl FnOnce() -> Vec<u8>) -> Self {
        match status {
            SEC_E_OK => LegOutcome::Done(token()),
            SEC_I_CONTINUE_NEEDED => LegOutcome::Continue(token()),
            status => LegOutcome::Failed(NativeStatus(status)),
        }
    }

    /// Variant name without the token bytes.
    pub fn name(&self) -> &'static str {
        match self {
            LegOutcome::Done(_) => "Done",
            LegOutcome::Continue(_) => "Continue",
            LegOutcome::Failed(_) => "Failed",
        }
    }
}

/// Drives `InitializeSecurityContext` leg after leg and owns the resulting context handle.
///
/// The context handle is written by the provider on the first leg and then passed back (and
/// updated in place) on every following leg. It is deleted when the engine is dropped, whether the
/// negotiation succeeded, failed or was abandoned.
pub struct NegotiationEngine<P: SecurityProvider> {
    provider: P,
    package: SecurityPackageType,
    target_name: Option<Vec<SecWChar>>,
    context_requirements: ClientRequestFlags,
    target_data_representation: DataRepresentation,
    context: Option<SecHandle>,
    state: ContextState,
    expiry: Expiry,
    flags: ClientResponseFlags,
}

impl<P: SecurityProvider> NegotiationEngine<P> {
    pub fn new(provider: P, config: &SecurityContextConfig) -> Self {
        Self {
            provider,
            package: config.package.clone(),
            target_name: config.target_name.as_deref().map(str_to_win_wstring),
            context_requirements: config.context_requirements | ClientRequestFlags::ALLOCATE_MEMORY,
            target_data_representation: config.target_data_representation,
            context: None,
            state: ContextState::NotStarted,
            expiry: Expiry::NotAvailable,
            flags: ClientResponseFlags::empty(),
        }
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Expiration reported by the most recent successful leg.
    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    /// Context attributes granted by the provider on the most recent successful leg.
    pub fn context_flags(&self) -> ClientResponseFlags {
        self.flags
    }

    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Runs one leg of the handshake and returns the token to send to the peer.
    ///
    /// The first leg is run without a server token. Every following leg needs the token the peer
    /// answered with.
    ///
    /// # MSDN
    ///
    /// * [InitializeSecurityContextW function](https://learn.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-initializesecuritycontextw)
    #[instrument(level = "debug", fields(package = %self.package, state = ?self.state), skip_all)]
    pub fn step(&mut self, credentials: &mut CredentialManager<P>, server_token: Option<&[u8]>) -> Result<Vec<u8>> {
        if self.state.is_terminal() {
            return Err(Error::new(
                ErrorType::ContractViolation,
                format!("the negotiation is over ({:?})", self.state),
            ));
        }

        if server_token.is_none() && self.state == ContextState::Negotiating {
            return Err(Error::new(
                ErrorType::ContractViolation,
                "a server token is required to continue the negotiation",
            ));
        }

        let mut input_data = server_token.map(<[u8]>::to_vec);
        let mut input_token = input_data.as_deref_mut().map(InputToken::new);
        let mut input_descriptor = input_token.as_mut().map(|token| token.descriptor());
        let input = input_descriptor
            .as_mut()
            .map_or(ptr::null_mut(), |descriptor| descriptor.as_mut_ptr());

        let mut output = OutputToken::new(&self.provider);
        let mut output_descriptor = output.descriptor();

        let mut handle = self.context.unwrap_or_default();
        let new_context = &mut handle as *mut SecHandle;
        let context = if self.context.is_some() {
            new_context
        } else {
            ptr::null_mut()
        };

        let target_name = self.target_name.as_ref().map_or(ptr::null(), |name| name.as_ptr());
        let mut context_attributes = 0;
        let mut expiry: TimeStamp = 0;

        // SAFETY: every descriptor borrows memory that lives until the end of this function; the
        // credentials handle is live as long as `credentials` is; `context` is either null or the
        // handle written by the provider on a previous leg.
        let status = unsafe {
            self.provider.initialize_security_context(
                credentials.as_mut_ptr(),
                context,
                target_name,
                self.context_requirements.bits(),
                self.target_data_representation
                    .to_u32()
                    .unwrap_or(DataRepresentation::Native as u32),
                input,
                new_context,
                output_descriptor.as_mut_ptr(),
                &mut context_attributes as *mut _,
                &mut expiry as *mut _,
            )
        };

        // A non-error status means the provider created (or kept) a context that has to be deleted later.
        if status >= 0 {
            self.context = Some(handle);
        }

        let outcome = LegOutcome::from_status(status, || output.materialize());
        trace!(output_len = output.len(), outcome = outcome.name(), "leg completed");
        drop(output);

        self.transition(outcome, expiry, context_attributes)
    }

    fn transition(&mut self, outcome: LegOutcome, expiry: TimeStamp, context_attributes: u32) -> Result<Vec<u8>> {
        match outcome {
            LegOutcome::Done(token) => {
                self.state = ContextState::Established;
                self.record_leg(expiry, context_attributes);
                debug!(token_len = token.len(), expiry = %self.expiry, "security context established");

                Ok(token)
            }
            LegOutcome::Continue(token) => {
                self.state = ContextState::Negotiating;
                self.record_leg(expiry, context_attributes);
                debug!(token_len = token.len(), "continue needed");

                Ok(token)
            }
            LegOutcome::Failed(status) => {
                self.state = ContextState::Failed;
                error!(%status, "InitializeSecurityContext failed");

                Err(Error::with_status(
                    ErrorType::AuthNegotiation,
                    status.code(),
                    format!("negotiation with the {} security package failed", self.package),
                ))
            }
        }
    }

    fn record_leg(&mut self, expiry: TimeStamp, context_attributes: u32) {
        self.expiry = Expiry::from_time_stamp(expiry);
        self.flags = ClientResponseFlags::from_bits_truncate(context_attributes);
    }
}

impl<P: SecurityProvider> fmt::Debug for NegotiationEngine<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationEngine")
            .field("package", &self.package)
            .field("context", &self.context)
            .field("state", &self.state)
            .field("expiry", &self.expiry)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl<P: SecurityProvider> Drop for NegotiationEngine<P> {
    fn drop(&mut self) {
        let Some(mut context) = self.context.take() else {
            return;
        };

        // SAFETY: the handle was written by `self.provider` on a non-failing leg and is only deleted here.
        let status = unsafe { self.provider.delete_security_context(&mut context as *mut _) };

        if status == SEC_E_OK {
            trace!(package = %self.package, state = ?self.state, "security context deleted");
        } else {
            warn!(package = %self.package, status = %NativeStatus(status), "DeleteSecurityContext failed");
        }
    }
}
