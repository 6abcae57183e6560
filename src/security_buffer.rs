//! Marshaling of tokens to and from provider buffer descriptors.
//!
//! Two directions are covered:
//!
//! * [`InputToken`] lends caller bytes to the provider. The [`BufferDescriptor`] it hands out
//!   borrows the token, so the descriptor cannot outlive the single provider call it was built
//!   for.
//! * [`OutputToken`] is an empty slot the provider fills with memory it allocates itself. The
//!   bytes are copied out with [`OutputToken::materialize`] and the provider memory is released
//!   when the `OutputToken` is dropped, whatever path the call took.

use std::ffi::c_void;
use std::marker::PhantomData;
use std::{ptr, slice};

use crate::provider::SecurityProvider;
use crate::sspi_data_types::{SecBuffer, SecBufferDesc, SECBUFFER_VERSION};
use crate::{NativeStatus, SecurityBufferType};

/// A `SecBufferDesc` pointing into buffers borrowed for `'a`.
#[derive(Debug)]
pub struct BufferDescriptor<'a> {
    raw: SecBufferDesc,
    _buffers: PhantomData<&'a mut [SecBuffer]>,
}

impl<'a> BufferDescriptor<'a> {
    pub fn new(buffers: &'a mut [SecBuffer]) -> Self {
        Self {
            raw: SecBufferDesc {
                ul_version: SECBUFFER_VERSION,
                c_buffers: buffers.len() as u32,
                p_buffers: buffers.as_mut_ptr(),
            },
            _buffers: PhantomData,
        }
    }

    pub fn buffers_count(&self) -> u32 {
        self.raw.c_buffers
    }

    pub fn as_mut_ptr(&mut self) -> *mut SecBufferDesc {
        &mut self.raw as *mut _
    }
}

/// A token received from the peer, described as a single `Token` buffer.
#[derive(Debug)]
pub struct InputToken<'data> {
    buffers: [SecBuffer; 1],
    _data: PhantomData<&'data mut [u8]>,
}

impl<'data> InputToken<'data> {
    pub fn new(data: &'data mut [u8]) -> Self {
        let pv_buffer = if data.is_empty() {
            ptr::null_mut()
        } else {
            data.as_mut_ptr() as *mut c_void
        };

        Self {
            buffers: [SecBuffer {
                cb_buffer: data.len() as u32,
                buffer_type: SecurityBufferType::Token as u32,
                pv_buffer,
            }],
            _data: PhantomData,
        }
    }

    pub fn descriptor(&mut self) -> BufferDescriptor<'_> {
        BufferDescriptor::new(&mut self.buffers)
    }
}

/// A `Token` buffer to be allocated and filled by the provider.
pub struct OutputToken<'p, P: SecurityProvider> {
    provider: &'p P,
    buffers: [SecBuffer; 1],
}

impl<'p, P: SecurityProvider> OutputToken<'p, P> {
    pub fn new(provider: &'p P) -> Self {
        Self {
            provider,
            buffers: [SecBuffer::empty(SecurityBufferType::Token as u32)],
        }
    }

    pub fn descriptor(&mut self) -> BufferDescriptor<'_> {
        BufferDescriptor::new(&mut self.buffers)
    }

    pub fn len(&self) -> usize {
        if self.buffers[0].pv_buffer.is_null() {
            0
        } else {
            self.buffers[0].cb_buffer as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the provider-filled bytes into a caller-owned vector.
    pub fn materialize(&self) -> Vec<u8> {
        let buffer = &self.buffers[0];

        if buffer.pv_buffer.is_null() || buffer.cb_buffer == 0 {
            return Vec::new();
        }

        // SAFETY: the provider reported `cb_buffer` bytes at the non-null `pv_buffer`, and the memory
        // stays allocated until `self` is dropped.
        unsafe { slice::from_raw_parts(buffer.pv_buffer as *const u8, buffer.cb_buffer as usize) }.to_vec()
    }
}

impl<P: SecurityProvider> Drop for OutputToken<'_, P> {
    fn drop(&mut self) {
        let buffer = &mut self.buffers[0];

        if buffer.pv_buffer.is_null() {
            return;
        }

        // SAFETY: a non-null `pv_buffer` was allocated by the provider during the call this slot
        // was lent to, and it is released exactly once here.
        let status = unsafe { self.provider.free_context_buffer(buffer.pv_buffer) };
        if status != 0 {
            warn!(status = %NativeStatus(status), "FreeContextBuffer failed");
        }

        buffer.pv_buffer = ptr::null_mut();
        buffer.cb_buffer = 0;
    }
}
