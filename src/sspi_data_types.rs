//! Fixed-layout records shared with the security provider.
//!
//! Every type here is `#[repr(C)]` and mirrors the native SSPI definitions bit for bit, so a
//! pointer to one of them can be handed to the provider as-is.

use std::ffi::c_void;
use std::ptr;

/// `SECURITY_STATUS` as returned by every provider entry point.
pub type SecurityStatus = i32;

/// Absolute time in 100 ns intervals since 1601-01-01 UTC (`FILETIME` packed into 64 bits).
pub type TimeStamp = i64;

pub type SecWChar = u16;

pub const SEC_E_OK: SecurityStatus = 0;
pub const SEC_I_CONTINUE_NEEDED: SecurityStatus = 0x0009_0312;
pub const SEC_I_COMPLETE_NEEDED: SecurityStatus = 0x0009_0313;
pub const SEC_I_COMPLETE_AND_CONTINUE: SecurityStatus = 0x0009_0314;

pub const SECBUFFER_VERSION: u32 = 0;

/// Handle pair used for both credentials (`CredHandle`) and contexts (`CtxtHandle`).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct SecHandle {
    pub dw_lower: usize,
    pub dw_upper: usize,
}

impl SecHandle {
    pub fn is_null(&self) -> bool {
        self.dw_lower == 0 && self.dw_upper == 0
    }
}

pub type PSecHandle = *mut SecHandle;

#[derive(Debug)]
#[repr(C)]
pub struct SecBuffer {
    pub cb_buffer: u32,
    pub buffer_type: u32,
    pub pv_buffer: *mut c_void,
}

impl SecBuffer {
    /// An output slot the provider fills with memory it allocates itself.
    pub fn empty(buffer_type: u32) -> Self {
        Self {
            cb_buffer: 0,
            buffer_type,
            pv_buffer: ptr::null_mut(),
        }
    }
}

pub type PSecBuffer = *mut SecBuffer;

#[derive(Debug)]
#[repr(C)]
pub struct SecBufferDesc {
    pub ul_version: u32,
    pub c_buffers: u32,
    pub p_buffers: PSecBuffer,
}

pub type PSecBufferDesc = *mut SecBufferDesc;

#[derive(Debug)]
#[repr(C)]
pub struct SecPkgInfoW {
    pub f_capabilities: u32,
    pub w_version: u16,
    pub w_rpc_id: u16,
    pub cb_max_token: u32,
    pub name: *mut SecWChar,
    pub comment: *mut SecWChar,
}

pub type PSecPkgInfoW = *mut SecPkgInfoW;
