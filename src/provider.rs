use std::ffi::c_void;

use crate::sspi_data_types::{PSecBufferDesc, PSecHandle, PSecPkgInfoW, SecWChar, SecurityStatus, TimeStamp};

/// Call surface of a platform security provider.
///
/// The methods mirror the native SSPI entry points one to one: they take raw pointers, return the
/// raw `SECURITY_STATUS` and never interpret it. Everything above this trait (handle ownership,
/// buffer marshaling, status interpretation) lives in this crate, so an implementation is only
/// expected to forward the call.
///
/// On Windows [`Secur32`](crate::winapi::Secur32) forwards to `secur32.dll`.
pub trait SecurityProvider {
    /// # Safety
    ///
    /// * `package` must point to a nul-terminated UTF-16 string;
    /// * `credentials` and `expiry` must be valid for writes.
    unsafe fn acquire_credentials_handle(
        &self,
        package: *const SecWChar,
        credential_use: u32,
        credentials: PSecHandle,
        expiry: *mut TimeStamp,
    ) -> SecurityStatus;

    /// # Safety
    ///
    /// * `credentials` must point to a handle obtained from
    ///   [`acquire_credentials_handle`](Self::acquire_credentials_handle);
    /// * `context` is either null (first leg) or points to a handle previously written to `new_context`;
    /// * `target_name` is either null or points to a nul-terminated UTF-16 string;
    /// * `input` is either null or a valid descriptor whose buffers stay alive for the duration of the call;
    /// * `new_context`, `output`, `context_attributes` and `expiry` must be valid for writes.
    #[allow(clippy::too_many_arguments)]
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
    ) -> SecurityStatus;

    /// # Safety
    ///
    /// `buffer` must have been allocated by this provider and not freed yet.
    unsafe fn free_context_buffer(&self, buffer: *mut c_void) -> SecurityStatus;

    /// # Safety
    ///
    /// `credentials` must point to a live credentials handle issued by this provider.
    unsafe fn free_credentials_handle(&self, credentials: PSecHandle) -> SecurityStatus;

    /// # Safety
    ///
    /// `context` must point to a live context handle issued by this provider.
    unsafe fn delete_security_context(&self, context: PSecHandle) -> SecurityStatus;

    /// # Safety
    ///
    /// `count` and `packages` must be valid for writes. On success `*packages` holds an array of
    /// `*count` entries owned by the provider that must be released with
    /// [`free_context_buffer`](Self::free_context_buffer).
    unsafe fn enumerate_security_packages(&self, count: *mut u32, packages: *mut PSecPkgInfoW) -> SecurityStatus;
}

impl<P: SecurityProvider + ?Sized> SecurityProvider for &P {
    unsafe fn acquire_credentials_handle(
        &self,
        package: *const SecWChar,
        credential_use: u32,
        credentials: PSecHandle,
        expiry: *mut TimeStamp,
    ) -> SecurityStatus {
        // SAFETY: the caller upholds the contract of the inner provider.
        unsafe { (**self).acquire_credentials_handle(package, credential_use, credentials, expiry) }
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
        // SAFETY: the caller upholds the contract of the inner provider.
        unsafe {
            (**self).initialize_security_context(
                credentials,
                context,
                target_name,
                context_requirements,
                target_data_representation,
                input,
                new_context,
                output,
                context_attributes,
                expiry,
            )
        }
    }

    unsafe fn free_context_buffer(&self, buffer: *mut c_void) -> SecurityStatus {
        // SAFETY: the caller upholds the contract of the inner provider.
        unsafe { (**self).free_context_buffer(buffer) }
    }

    unsafe fn free_credentials_handle(&self, credentials: PSecHandle) -> SecurityStatus {
        // SAFETY: the caller upholds the contract of the inner provider.
        unsafe { (**self).free_credentials_handle(credentials) }
    }

    unsafe fn delete_security_context(&self, context: PSecHandle) -> SecurityStatus {
        // SAFETY: the caller upholds the contract of the inner provider.
        unsafe { (**self).delete_security_context(context) }
    }

    unsafe fn enumerate_security_packages(&self, count: *mut u32, packages: *mut PSecPkgInfoW) -> SecurityStatus {
        // SAFETY: the caller upholds the contract of the inner provider.
        unsafe { (**self).enumerate_security_packages(count, packages) }
    }
}
