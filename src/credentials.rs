use std::fmt;

use num_traits::ToPrimitive;

use crate::expiry::Expiry;
use crate::provider::SecurityProvider;
use crate::sspi_data_types::{PSecHandle, SecHandle, TimeStamp, SEC_E_OK};
use crate::utils::str_to_win_wstring;
use crate::{CredentialUse, Error, ErrorType, NativeStatus, Result, SecurityPackageType};

/// Owns a credentials handle issued by the provider for one security package.
///
/// The handle is acquired in [`CredentialManager::acquire`] and freed when the manager is
/// dropped. The manager cannot be cloned, so the handle is released exactly once.
pub struct CredentialManager<P: SecurityProvider> {
    provider: P,
    handle: SecHandle,
    package: SecurityPackageType,
    expiry: Expiry,
}

impl<P: SecurityProvider> CredentialManager<P> {
    /// Retrieves a handle to the preexisting credentials of the current security principal.
    ///
    /// # MSDN
    ///
    /// * [AcquireCredentialsHandleW function](https://learn.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-acquirecredentialshandlew)
    #[instrument(level = "debug", skip(provider, package), fields(package = %package))]
    pub fn acquire(provider: P, package: SecurityPackageType, credential_use: CredentialUse) -> Result<Self> {
        let package_name = str_to_win_wstring(package.as_ref());
        let mut handle = SecHandle::default();
        let mut expiry: TimeStamp = 0;

        // SAFETY: `package_name` is nul-terminated and outlives the call; `handle` and `expiry`
        // are valid for writes.
        let status = unsafe {
            provider.acquire_credentials_handle(
                package_name.as_ptr(),
                credential_use.to_u32().unwrap_or(CredentialUse::Outbound as u32),
                &mut handle as *mut _,
                &mut expiry as *mut _,
            )
        };

        if status != SEC_E_OK {
            error!(status = %NativeStatus(status), "AcquireCredentialsHandle failed");

            return Err(Error::with_status(
                ErrorType::AuthInit,
                status,
                format!("cannot acquire credentials for the {package} security package"),
            ));
        }

        let expiry = Expiry::from_time_stamp(expiry);
        debug!(%expiry, "credentials acquired");

        Ok(Self {
            provider,
            handle,
            package,
            expiry,
        })
    }

    pub fn package(&self) -> &SecurityPackageType {
        &self.package
    }

    pub fn expiry(&self) -> Expiry {
        self.expiry
    }

    pub(crate) fn as_mut_ptr(&mut self) -> PSecHandle {
        &mut self.handle as *mut _
    }
}

impl<P: SecurityProvider> fmt::Debug for CredentialManager<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialManager")
            .field("handle", &self.handle)
            .field("package", &self.package)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl<P: SecurityProvider> Drop for CredentialManager<P> {
    fn drop(&mut self) {
        // SAFETY: the handle was issued by `self.provider` in `acquire` and is only released here.
        let status = unsafe { self.provider.free_credentials_handle(&mut self.handle as *mut _) };

        if status == SEC_E_OK {
            trace!(package = %self.package, "credentials released");
        } else {
            warn!(package = %self.package, status = %NativeStatus(status), "FreeCredentialsHandle failed");
        }
    }
}
