//! The security provider shipped with Windows (`secur32.dll`).

use std::ffi::c_void;
use std::ptr;

use windows_sys::Win32::Security::Authentication::Identity::{
    AcquireCredentialsHandleW, DeleteSecurityContext, EnumerateSecurityPackagesW, FreeContextBuffer,
    FreeCredentialsHandle, InitializeSecurityContextW,
};

use crate::provider::SecurityProvider;
use crate::sspi_data_types::{PSecBufferDesc, PSecHandle, PSecPkgInfoW, SecWChar, SecurityStatus, TimeStamp};

/// Forwards every [`SecurityProvider`] call to the matching `secur32` export.
///
/// The records in [`sspi_data_types`](crate::sspi_data_types) have the same layout as their
/// `windows-sys` counterparts, so pointers are passed through unchanged.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Secur32;

impl SecurityProvider for Secur32 {
    unsafe fn acquire_credentials_handle(
        &self,
        package: *const SecWChar,
        credential_use: u32,
        credentials: PSecHandle,
        expiry: *mut TimeStamp,
    ) -> SecurityStatus {
        // SAFETY: the caller upholds the pointer contract documented on the trait.
        unsafe {
            AcquireCredentialsHandleW(
                ptr::null(),
                package,
                credential_use,
                ptr::null(),
                ptr::null(),
                None,
                ptr::null(),
                credentials as _,
                expiry as _,
            )
        }
    }

    unsafe fn initialize_security_context(
        &self,
        credentials: PSecHandle,
        context: PSecHandle,
        target_name: *const SecWChar,
        context_requirements: u32,
        target_data_representation: u32,
        input: PSecBufferDesc,
        new_context: PSecHandle,
        output: PSecBufferDesc,
        context_attributes: *mut u32,
        expiry: *mut TimeStamp,
    ) -> SecurityStatus {
        // SAFETY: the caller upholds the pointer contract documented on the trait.
        unsafe {
            InitializeSecurityContextW(
                credentials as _,
                context as _,
                target_name,
                context_requirements,
                0,
                target_data_representation,
                input as _,
                0,
                new_context as _,
                output as _,
                context_attributes,
                expiry as _,
            )
        }
    }

    unsafe fn free_context_buffer(&self, buffer: *mut c_void) -> SecurityStatus {
        // SAFETY: `buffer` was allocated by secur32.
        unsafe { FreeContextBuffer(buffer) }
    }

    unsafe fn free_credentials_handle(&self, credentials: PSecHandle) -> SecurityStatus {
        // SAFETY: `credentials` is a live handle issued by secur32.
        unsafe { FreeCredentialsHandle(credentials as _) }
    }

    unsafe fn delete_security_context(&self, context: PSecHandle) -> SecurityStatus {
        // SAFETY: `context` is a live handle issued by secur32.
        unsafe { DeleteSecurityContext(context as _) }
    }

    unsafe fn enumerate_security_packages(&self, count: *mut u32, packages: *mut PSecPkgInfoW) -> SecurityStatus {
        // SAFETY: both out-parameters are valid for writes.
        unsafe { EnumerateSecurityPackagesW(count, packages as _) }
    }
}
