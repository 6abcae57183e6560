use std::{ptr, slice};

use crate::provider::SecurityProvider;
use crate::sspi_data_types::{PSecPkgInfoW, SecPkgInfoW, SEC_E_OK};
use crate::utils::wide_ptr_to_string;
use crate::{Error, ErrorType, NativeStatus, PackageCapabilities, Result, SecurityPackageType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub capabilities: PackageCapabilities,
    pub version: u16,
    pub rpc_id: u16,
    pub max_token_len: u32,
    pub name: SecurityPackageType,
    pub comment: String,
}

impl TryFrom<&SecPkgInfoW> for PackageInfo {
    type Error = Error;

    fn try_from(p: &SecPkgInfoW) -> Result<Self> {
        // SAFETY: the provider fills `Name` and `Comment` with nul-terminated strings (or null).
        let (name, comment) = unsafe { (wide_ptr_to_string(p.name)?, wide_ptr_to_string(p.comment)?) };

        Ok(PackageInfo {
            capabilities: PackageCapabilities::from_bits_truncate(p.f_capabilities),
            version: p.w_version,
            rpc_id: p.w_rpc_id,
            max_token_len: p.cb_max_token,
            name: SecurityPackageType::from(name),
            comment,
        })
    }
}

struct SecurityPackagesGuard<'p, P: SecurityProvider> {
    provider: &'p P,
    packages: PSecPkgInfoW,
}

impl<P: SecurityProvider> Drop for SecurityPackagesGuard<'_, P> {
    fn drop(&mut self) {
        if self.packages.is_null() {
            return;
        }

        // SAFETY: the array was allocated by the provider in `enumerate_security_packages`.
        let status = unsafe { self.provider.free_context_buffer(self.packages as *mut _) };
        if status != SEC_E_OK {
            warn!(status = %NativeStatus(status), "FreeContextBuffer for SecurityPackages failed");
        }
    }
}

/// Returns information about every security package the provider makes available.
///
/// The result is materialized from a single provider call; the provider-owned array is released
/// before returning, also when one of the entries cannot be decoded.
///
/// # MSDN
///
/// * [EnumerateSecurityPackagesW function](https://learn.microsoft.com/en-us/windows/win32/api/sspi/nf-sspi-enumeratesecuritypackagesw)
#[instrument(level = "debug", skip_all)]
pub fn enumerate_security_packages_with<P: SecurityProvider>(provider: &P) -> Result<Vec<PackageInfo>> {
    let mut count: u32 = 0;
    let mut packages: PSecPkgInfoW = ptr::null_mut();

    // SAFETY: both out-parameters are valid for writes.
    let status = unsafe { provider.enumerate_security_packages(&mut count as *mut _, &mut packages as *mut _) };
    let packages_guard = SecurityPackagesGuard { provider, packages };

    if status != SEC_E_OK {
        error!(status = %NativeStatus(status), "EnumerateSecurityPackages failed");

        return Err(Error::with_status(
            ErrorType::AuthInit,
            status,
            "cannot enumerate security packages",
        ));
    }

    if packages_guard.packages.is_null() || count == 0 {
        return Ok(Vec::new());
    }

    // SAFETY: on success the provider returns an array of `count` entries that stays alive until
    // `packages_guard` is dropped.
    let raw_packages = unsafe { slice::from_raw_parts(packages_guard.packages as *const SecPkgInfoW, count as usize) };

    let packages = raw_packages.iter().map(PackageInfo::try_from).collect::<Result<Vec<_>>>()?;
    debug!(count = packages.len(), "security packages enumerated");

    Ok(packages)
}

/// Returns information about the security packages installed on this machine.
#[cfg(windows)]
pub fn enumerate_security_packages() -> Result<Vec<PackageInfo>> {
    enumerate_security_packages_with(&crate::winapi::Secur32)
}
