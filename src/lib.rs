//! Client-side security context negotiation on top of a platform security provider.
//!
//! The crate drives the challenge/response handshake of an SSPI package (Negotiate, NTLM,
//! Kerberos, ...) and takes care of everything around it: credential and context handle
//! lifetimes, marshaling tokens in and out of provider-owned memory, expiration tracking and
//! the translation of provider status codes into [`Error`]s.
//!
//! ```no_run
//! # #[cfg(windows)]
//! # fn main() -> sspi_client::Result<()> {
//! use sspi_client::SecurityContextClient;
//!
//! let mut client = SecurityContextClient::new("Negotiate")?;
//! let first_leg = client.get_client_token(None)?;
//! // send `first_leg` to the peer, feed its answer back with `get_client_token(Some(..))`
//! # let _ = first_leg;
//! client.dispose();
//! # Ok(())
//! # }
//! # #[cfg(not(windows))]
//! # fn main() {}
//! ```

#[macro_use]
extern crate tracing;

pub mod client;
pub mod config;
pub mod credentials;
pub mod expiry;
#[cfg(feature = "logging")]
pub mod logging;
pub mod negotiation;
pub mod package_info;
pub mod provider;
pub mod security_buffer;
pub mod sspi_data_types;
mod utils;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        pub mod winapi;

        pub use self::package_info::enumerate_security_packages;
    }
}

use std::{error, fmt, io, result, string};

use bitflags::bitflags;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive as _;

pub use self::client::SecurityContextClient;
pub use self::config::SecurityContextConfig;
pub use self::credentials::CredentialManager;
pub use self::expiry::Expiry;
pub use self::negotiation::{ContextState, LegOutcome, NegotiationEngine};
pub use self::package_info::{enumerate_security_packages_with, PackageInfo};
pub use self::provider::SecurityProvider;
pub use self::security_buffer::{BufferDescriptor, InputToken, OutputToken};
use self::sspi_data_types::SecurityStatus;

pub type Result<T> = result::Result<T, Error>;

pub const NEGOTIATE_PACKAGE_NAME: &str = "Negotiate";
pub const NTLM_PACKAGE_NAME: &str = "NTLM";
pub const KERBEROS_PACKAGE_NAME: &str = "Kerberos";

bitflags! {
    /// Context requirements a client asks the provider for (`ISC_REQ_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClientRequestFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const PROMPT_FOR_CREDS = 0x40;
        const USE_SUPPLIED_CREDS = 0x80;
        const ALLOCATE_MEMORY = 0x100;
        const USE_DCE_STYLE = 0x200;
        const DATAGRAM = 0x400;
        const CONNECTION = 0x800;
        const CALL_LEVEL = 0x1000;
        const FRAGMENT_SUPPLIED = 0x2000;
        const EXTENDED_ERROR = 0x4000;
        const STREAM = 0x8000;
        const INTEGRITY = 0x10_000;
        const IDENTIFY = 0x20_000;
        const NULL_SESSION = 0x40_000;
        const MANUAL_CRED_VALIDATION = 0x80_000;
        const RESERVED1 = 0x100_000;
        const FRAGMENT_TO_FIT = 0x200_000;
        const FORWARD_CREDENTIALS = 0x400_000;
        const NO_INTEGRITY = 0x800_000;
        const USE_HTTP_STYLE = 0x100_0000;
        const UNVERIFIED_TARGET_NAME = 0x2000_0000;
        const CONFIDENTIALITY_ONLY = 0x4000_0000;
    }
}

bitflags! {
    /// Context attributes granted by the provider (`ISC_RET_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClientResponseFlags: u32 {
        const DELEGATE = 0x1;
        const MUTUAL_AUTH = 0x2;
        const REPLAY_DETECT = 0x4;
        const SEQUENCE_DETECT = 0x8;
        const CONFIDENTIALITY = 0x10;
        const USE_SESSION_KEY = 0x20;
        const USED_COLLECTED_CREDS = 0x40;
        const USED_SUPPLIED_CREDS = 0x80;
        const ALLOCATED_MEMORY = 0x100;
        const USED_DCE_STYLE = 0x200;
        const DATAGRAM = 0x400;
        const CONNECTION = 0x800;
        const INTERMEDIATE_RETURN = 0x1000;
        const CALL_LEVEL = 0x2000;
        const EXTENDED_ERROR = 0x4000;
        const STREAM = 0x8000;
        const INTEGRITY = 0x10_000;
        const IDENTIFY = 0x20_000;
        const NULL_SESSION = 0x40_000;
        const MANUAL_CRED_VALIDATION = 0x80_000;
        const RESERVED1 = 0x10_0000;
        const FRAGMENT_ONLY = 0x200_000;
        const FORWARD_CREDENTIALS = 0x400_000;
        const USED_HTTP_STYLE = 0x100_0000;
        const NO_ADDITIONAL_TOKEN = 0x200_0000;
        const REAUTHENTICATION = 0x800_0000;
        const CONFIDENTIALITY_ONLY = 0x4000_0000;
    }
}

bitflags! {
    /// Capabilities advertised by a security package (`SECPKG_FLAG_*`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PackageCapabilities: u32 {
        const INTEGRITY = 0x1;
        const PRIVACY = 0x2;
        const TOKEN_ONLY = 0x4;
        const DATAGRAM = 0x8;
        const CONNECTION = 0x10;
        const MULTI_REQUIRED = 0x20;
        const CLIENT_ONLY = 0x40;
        const EXTENDED_ERROR = 0x80;
        const IMPERSONATION = 0x100;
        const ACCEPT_WIN32_NAME = 0x200;
        const STREAM = 0x400;
        const NEGOTIABLE = 0x800;
        const GSS_COMPATIBLE = 0x1000;
        const LOGON = 0x2000;
        const ASCII_BUFFERS = 0x4000;
        const FRAGMENT = 0x8000;
        const MUTUAL_AUTH = 0x1_0000;
        const DELEGATION = 0x2_0000;
        const READONLY_WITH_CHECKSUM = 0x4_0000;
        const RESTRICTED_TOKENS = 0x8_0000;
        const NEGO_EXTENDER = 0x10_0000;
        const NEGOTIABLE2 = 0x20_0000;
        const APP_CONTAINER_PASSTHROUGH = 0x40_0000;
        const APP_CONTAINER_CHECKS = 0x80_0000;
        const CREDENTIAL_ISOLATION_ENABLED = 0x100_0000;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum DataRepresentation {
    Network = 0,
    Native = 0x10,
}

#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum SecurityBufferType {
    Empty = 0,
    Data = 1,
    Token = 2,
    TransportToPackageParameters = 3,
    Missing = 4,
    Extra = 5,
    StreamTrailer = 6,
    StreamHeader = 7,
    NegotiationInfo = 8,
    Padding = 9,
    Stream = 10,
    ObjectIdsList = 11,
    ObjectIdsListSignature = 12,
    Target = 13,
    ChannelBindings = 14,
    ChangePasswordResponse = 15,
    TargetHost = 16,
    Alert = 17,
    ApplicationProtocol = 18,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum CredentialUse {
    Inbound = 1,
    Outbound = 2,
    Both = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecurityPackageType {
    Negotiate,
    Ntlm,
    Kerberos,
    Other(String),
}

impl AsRef<str> for SecurityPackageType {
    fn as_ref(&self) -> &str {
        match self {
            SecurityPackageType::Negotiate => NEGOTIATE_PACKAGE_NAME,
            SecurityPackageType::Ntlm => NTLM_PACKAGE_NAME,
            SecurityPackageType::Kerberos => KERBEROS_PACKAGE_NAME,
            SecurityPackageType::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for SecurityPackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for SecurityPackageType {
    fn from(name: &str) -> Self {
        match name {
            NEGOTIATE_PACKAGE_NAME => SecurityPackageType::Negotiate,
            NTLM_PACKAGE_NAME => SecurityPackageType::Ntlm,
            KERBEROS_PACKAGE_NAME => SecurityPackageType::Kerberos,
            other => SecurityPackageType::Other(other.to_owned()),
        }
    }
}

impl From<String> for SecurityPackageType {
    fn from(name: String) -> Self {
        SecurityPackageType::from(name.as_str())
    }
}

/// Well-known provider failure codes (`SEC_E_*`).
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ErrorKind {
    Unknown = 0,
    InsufficientMemory = 0x8009_0300,
    InvalidHandle = 0x8009_0301,
    UnsupportedFunction = 0x8009_0302,
    TargetUnknown = 0x8009_0303,
    InternalError = 0x8009_0304,
    SecurityPackageNotFound = 0x8009_0305,
    NotOwned = 0x8009_0306,
    CannotInstall = 0x8009_0307,
    InvalidToken = 0x8009_0308,
    CannotPack = 0x8009_0309,
    OperationNotSupported = 0x8009_030A,
    NoImpersonation = 0x8009_030B,
    LogonDenied = 0x8009_030C,
    UnknownCredentials = 0x8009_030D,
    NoCredentials = 0x8009_030E,
    MessageAltered = 0x8009_030F,
    OutOfSequence = 0x8009_0310,
    NoAuthenticatingAuthority = 0x8009_0311,
    BadPackageId = 0x8009_0316,
    ContextExpired = 0x8009_0317,
    IncompleteMessage = 0x8009_0318,
    IncompleteCredentials = 0x8009_0320,
    BufferTooSmall = 0x8009_0321,
    WrongPrincipalName = 0x8009_0322,
    TimeSkew = 0x8009_0324,
    UntrustedRoot = 0x8009_0325,
    IllegalMessage = 0x8009_0326,
    CertificateUnknown = 0x8009_0327,
    CertificateExpired = 0x8009_0328,
    EncryptFailure = 0x8009_0329,
    DecryptFailure = 0x8009_0330,
    AlgorithmMismatch = 0x8009_0331,
    SecurityQosFailed = 0x8009_0332,
    UnfinishedContextDeleted = 0x8009_0333,
    NoTgtReply = 0x8009_0334,
    NoIpAddress = 0x8009_0335,
    WrongCredentialHandle = 0x8009_0336,
    CryptoSystemInvalid = 0x8009_0337,
    MaxReferralsExceeded = 0x8009_0338,
    MustBeKdc = 0x8009_0339,
    StrongCryptoNotSupported = 0x8009_033A,
    TooManyPrincipals = 0x8009_033B,
    NoPaData = 0x8009_033C,
    PkInitNameMismatch = 0x8009_033D,
    SmartCardLogonRequired = 0x8009_033E,
    ShutdownInProgress = 0x8009_033F,
    KdcInvalidRequest = 0x8009_0340,
    KdcUnknownEType = 0x8009_0341,
    KdcUnknownEType2 = 0x8009_0342,
    UnsupportedPreAuth = 0x8009_0343,
    DelegationRequired = 0x8009_0345,
    BadBindings = 0x8009_0346,
    MultipleAccounts = 0x8009_0347,
    NoKerdKey = 0x8009_0348,
    CertWrongUsage = 0x8009_0349,
    DowngradeDetected = 0x8009_0350,
    InvalidParameter = 0x8009_035D,
    DelegationPolicy = 0x8009_035E,
    PolicyNtlmOnly = 0x8009_035F,
    NoContext = 0x8009_0361,
    MutualAuthFailed = 0x8009_0363,
    OnlyHttpsAllowed = 0x8009_0365,
    ApplicationProtocolMismatch = 0x8009_0367,
}

/// Raw status code reported by the provider, kept for diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeStatus(pub SecurityStatus);

impl NativeStatus {
    pub fn code(self) -> SecurityStatus {
        self.0
    }

    pub fn kind(self) -> ErrorKind {
        ErrorKind::from_u32(self.0 as u32).unwrap_or(ErrorKind::Unknown)
    }
}

impl fmt::Display for NativeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:08X})", self.kind(), self.0 as u32)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorType {
    /// Credential acquisition or package enumeration failed.
    AuthInit,
    /// A negotiation leg returned neither success nor continue-needed. The context is unusable.
    AuthNegotiation,
    /// The API was used in a way its contract forbids, e.g. stepping a finished context.
    ContractViolation,
}

/// Holds the [`ErrorType`], the provider status (if the error originates from the provider) and
/// a description of the error.
#[derive(Debug, Clone)]
pub struct Error {
    pub error_type: ErrorType,
    pub status: Option<NativeStatus>,
    pub description: String,
}

impl Error {
    pub fn new(error_type: ErrorType, description: impl ToString) -> Self {
        Self {
            error_type,
            status: None,
            description: description.to_string(),
        }
    }

    pub fn with_status(error_type: ErrorType, status: SecurityStatus, description: impl ToString) -> Self {
        Self {
            error_type,
            status: Some(NativeStatus(status)),
            description: description.to_string(),
        }
    }

    pub fn native_code(&self) -> Option<SecurityStatus> {
        self.status.map(NativeStatus::code)
    }
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.error_type, self.description)?;

        if let Some(status) = self.status {
            write!(f, ": {status}")?;
        }

        Ok(())
    }
}

impl From<string::FromUtf16Error> for Error {
    fn from(err: string::FromUtf16Error) -> Self {
        Self::new(ErrorType::AuthInit, format!("UTF-16 error: {err}"))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        io::Error::other(err.to_string())
    }
}
