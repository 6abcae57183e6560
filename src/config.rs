use crate::{ClientRequestFlags, DataRepresentation, SecurityPackageType};

/// Settings of one client-side negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContextConfig {
    pub package: SecurityPackageType,
    /// Service principal name of the peer. Packages that can do without it (NTLM, Negotiate
    /// falling back to NTLM) accept `None`.
    pub target_name: Option<String>,
    pub context_requirements: ClientRequestFlags,
    pub target_data_representation: DataRepresentation,
}

impl SecurityContextConfig {
    /// Requests a connection-oriented context whose output tokens are allocated by the provider.
    pub fn new(package: impl Into<SecurityPackageType>) -> Self {
        Self {
            package: package.into(),
            target_name: None,
            context_requirements: ClientRequestFlags::ALLOCATE_MEMORY | ClientRequestFlags::CONNECTION,
            target_data_representation: DataRepresentation::Native,
        }
    }

    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Self {
        self.target_name = Some(target_name.into());
        self
    }

    /// Replaces the requested context requirements.
    ///
    /// `ALLOCATE_MEMORY` is always kept: output tokens are read from provider-allocated memory.
    pub fn with_context_requirements(mut self, context_requirements: ClientRequestFlags) -> Self {
        self.context_requirements = context_requirements | ClientRequestFlags::ALLOCATE_MEMORY;
        self
    }

    pub fn with_data_representation(mut self, target_data_representation: DataRepresentation) -> Self {
        self.target_data_representation = target_data_representation;
        self
    }
}
