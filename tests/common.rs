#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::c_void;
use std::io::{self, Write};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use sspi_client::sspi_data_types::{
    PSecBufferDesc, PSecHandle, PSecPkgInfoW, SecHandle, SecPkgInfoW, SecWChar, SecurityStatus, TimeStamp,
    SEC_E_OK, SEC_I_CONTINUE_NEEDED,
};
use sspi_client::{SecurityBufferType, SecurityProvider};
use tracing_subscriber::fmt::MakeWriter;

pub const SEC_E_SECPKG_NOT_FOUND: SecurityStatus = 0x8009_0305_u32 as i32;
pub const SEC_E_INVALID_TOKEN: SecurityStatus = 0x8009_0308_u32 as i32;
pub const SEC_E_LOGON_DENIED: SecurityStatus = 0x8009_030C_u32 as i32;
pub const SEC_E_INSUFFICIENT_MEMORY: SecurityStatus = 0x8009_0300_u32 as i32;
pub const SEC_E_INVALID_HANDLE: SecurityStatus = 0x8009_0301_u32 as i32;

/// 2030-01-01T00:00:00Z as a FILETIME.
pub const EXPIRY_2030: TimeStamp = 135_379_296_000_000_000;

pub const NEVER_EXPIRES: TimeStamp = i64::MAX;

const CREDENTIALS_TAG: usize = 0xCCCC;
const CONTEXT_TAG: usize = 0xC7C7;

/// Scripted answer of one `InitializeSecurityContext` call.
#[derive(Debug, Clone)]
pub struct Leg {
    pub status: SecurityStatus,
    /// Bytes the provider allocates for the output buffer. `None` leaves the buffer untouched.
    pub token: Option<Vec<u8>>,
    pub expiry: TimeStamp,
    pub attributes: u32,
}

impl Leg {
    pub fn continue_with(token: &[u8]) -> Self {
        Self {
            status: SEC_I_CONTINUE_NEEDED,
            token: Some(token.to_vec()),
            expiry: EXPIRY_2030,
            attributes: 0x900,
        }
    }

    pub fn done_with(token: &[u8]) -> Self {
        Self {
            status: SEC_E_OK,
            token: Some(token.to_vec()),
            expiry: EXPIRY_2030,
            attributes: 0x900,
        }
    }

    pub fn fail(status: SecurityStatus) -> Self {
        Self {
            status,
            token: None,
            expiry: 0,
            attributes: 0,
        }
    }

    pub fn with_token(mut self, token: Option<&[u8]>) -> Self {
        self.token = token.map(<[u8]>::to_vec);
        self
    }

    pub fn with_expiry(mut self, expiry: TimeStamp) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_attributes(mut self, attributes: u32) -> Self {
        self.attributes = attributes;
        self
    }
}

/// What the provider observed on one `InitializeSecurityContext` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegCall {
    pub input: Option<Vec<u8>>,
    pub input_buffer_type: Option<u32>,
    pub context: Option<SecHandle>,
    pub target_name: Option<String>,
    pub context_requirements: u32,
    pub target_data_representation: u32,
    pub output_buffers: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    Credentials(SecHandle),
    Context(SecHandle),
}

#[derive(Debug, Clone)]
pub struct MockPackage {
    pub name: String,
    pub comment: String,
    pub capabilities: u32,
    pub max_token: u32,
    /// Raw UTF-16 used instead of `name` when set (used to inject undecodable names).
    pub raw_name: Option<Vec<u16>>,
}

impl MockPackage {
    pub fn new(name: &str, comment: &str, capabilities: u32, max_token: u32) -> Self {
        Self {
            name: name.to_owned(),
            comment: comment.to_owned(),
            capabilities,
            max_token,
            raw_name: None,
        }
    }
}

enum Allocation {
    Bytes { len: usize },
    Packages { count: usize, _strings: Vec<Vec<u16>> },
}

#[derive(Default)]
pub struct ProviderState {
    pub packages: Vec<MockPackage>,
    pub legs: VecDeque<Leg>,
    pub acquire_status: Option<SecurityStatus>,
    pub enumerate_status: SecurityStatus,
    /// Returned by the three release calls after the resource has been released.
    pub release_status: SecurityStatus,
    pub credentials_expiry: TimeStamp,
    pub acquired: Vec<(String, u32)>,
    pub calls: Vec<LegCall>,
    pub produced_tokens: Vec<Vec<u8>>,
    pub releases: Vec<Release>,
    pub freed_buffers: usize,
    next_handle: usize,
    live_credentials: HashSet<SecHandle>,
    live_contexts: HashSet<SecHandle>,
    live_buffers: HashMap<usize, Allocation>,
}

/// In-memory provider with scripted negotiation legs.
///
/// It hands out real heap allocations for output tokens and package arrays and tracks every
/// handle and buffer, panicking on double releases and on handles it did not issue.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        let provider = Self::default();
        {
            let mut state = provider.state();
            state.packages = vec![
                MockPackage::new("Negotiate", "Microsoft Package Negotiator", 0x0008_3BB3, 48_256),
                MockPackage::new("NTLM", "NTLM Security Package", 0x0008_2B37, 2_888),
                MockPackage::new("Kerberos", "Microsoft Kerberos V1.0", 0x0008_3BBF, 48_000),
            ];
            state.credentials_expiry = NEVER_EXPIRES;
            state.next_handle = 0x1000;
        }

        provider
    }

    pub fn with_legs(self, legs: impl IntoIterator<Item = Leg>) -> Self {
        self.state().legs.extend(legs);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<LegCall> {
        self.state().calls.clone()
    }

    pub fn releases(&self) -> Vec<Release> {
        self.state().releases.clone()
    }

    pub fn live_credentials(&self) -> usize {
        self.state().live_credentials.len()
    }

    pub fn live_contexts(&self) -> usize {
        self.state().live_contexts.len()
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.state().live_buffers.len()
    }

    pub fn freed_buffers(&self) -> usize {
        self.state().freed_buffers
    }

    pub fn remaining_legs(&self) -> usize {
        self.state().legs.len()
    }

    /// Every native resource handed out has been returned.
    pub fn assert_clean(&self) {
        let state = self.state();

        assert!(state.live_credentials.is_empty(), "credentials leaked: {:?}", state.live_credentials);
        assert!(state.live_contexts.is_empty(), "contexts leaked: {:?}", state.live_contexts);
        assert!(state.live_buffers.is_empty(), "{} buffers leaked", state.live_buffers.len());
    }
}

impl ProviderState {
    fn issue_handle(&mut self, tag: usize) -> SecHandle {
        self.next_handle += 1;

        SecHandle {
            dw_lower: self.next_handle,
            dw_upper: tag,
        }
    }

    fn allocate_bytes(&mut self, bytes: &[u8]) -> *mut c_void {
        // Zero-length tokens still get a distinct, freeable allocation.
        let mut storage = bytes.to_vec();
        if storage.is_empty() {
            storage.push(0);
        }
        let len = storage.len();
        let allocation = Box::into_raw(storage.into_boxed_slice()) as *mut u8;

        self.live_buffers.insert(allocation as usize, Allocation::Bytes { len });

        allocation as *mut c_void
    }
}

unsafe fn read_wide(ptr: *const SecWChar) -> Option<String> {
    if ptr.is_null() {
        return None;
    }

    let mut len = 0;
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }

    Some(String::from_utf16_lossy(unsafe { std::slice::from_raw_parts(ptr, len) }))
}

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

impl SecurityProvider for ScriptedProvider {
    unsafe fn acquire_credentials_handle(
        &self,
        package: *const SecWChar,
        credential_use: u32,
        credentials: PSecHandle,
        expiry: *mut TimeStamp,
    ) -> SecurityStatus {
        let mut state = self.state();
        let package = unsafe { read_wide(package) }.expect("package name is required");

        state.acquired.push((package.clone(), credential_use));

        if let Some(status) = state.acquire_status {
            return status;
        }

        if !state.packages.iter().any(|p| p.name == package) {
            return SEC_E_SECPKG_NOT_FOUND;
        }

        let handle = state.issue_handle(CREDENTIALS_TAG);
        state.live_credentials.insert(handle);

        unsafe {
            *credentials = handle;
            *expiry = state.credentials_expiry;
        }

        SEC_E_OK
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
        let mut state = self.state();

        let credentials = unsafe { *credentials };
        assert!(state.live_credentials.contains(&credentials), "unknown credentials {credentials:?}");

        let context = if context.is_null() {
            None
        } else {
            let handle = unsafe { *context };
            assert!(state.live_contexts.contains(&handle), "unknown context {handle:?}");
            Some(handle)
        };

        let (input_bytes, input_buffer_type) = if input.is_null() {
            (None, None)
        } else {
            let input = unsafe { &*input };
            assert_eq!(input.c_buffers, 1);
            let buffer = unsafe { &*input.p_buffers };
            let bytes = if buffer.pv_buffer.is_null() {
                Vec::new()
            } else {
                unsafe { std::slice::from_raw_parts(buffer.pv_buffer as *const u8, buffer.cb_buffer as usize) }.to_vec()
            };

            (Some(bytes), Some(buffer.buffer_type))
        };

        let output = unsafe { &mut *output };
        let output_buffer = unsafe { &mut *output.p_buffers };
        assert_eq!(output_buffer.buffer_type, SecurityBufferType::Token as u32);
        assert!(output_buffer.pv_buffer.is_null(), "output buffer must be empty");

        state.calls.push(LegCall {
            input: input_bytes,
            input_buffer_type,
            context,
            target_name: unsafe { read_wide(target_name) },
            context_requirements,
            target_data_representation,
            output_buffers: output.c_buffers,
        });

        let leg = state.legs.pop_front().expect("no scripted leg left");

        if leg.status >= 0 {
            let handle = match context {
                Some(handle) => handle,
                None => {
                    let handle = state.issue_handle(CONTEXT_TAG);
                    state.live_contexts.insert(handle);
                    handle
                }
            };

            unsafe { *new_context = handle };
        }

        if let Some(token) = &leg.token {
            let allocation = state.allocate_bytes(token);
            output_buffer.pv_buffer = allocation;
            output_buffer.cb_buffer = token.len() as u32;
            state.produced_tokens.push(token.clone());
        }

        unsafe {
            *context_attributes = leg.attributes;
            *expiry = leg.expiry;
        }

        leg.status
    }

    unsafe fn free_context_buffer(&self, buffer: *mut c_void) -> SecurityStatus {
        let mut state = self.state();

        let allocation = state
            .live_buffers
            .remove(&(buffer as usize))
            .unwrap_or_else(|| panic!("buffer {buffer:?} freed twice or never allocated"));

        match allocation {
            Allocation::Bytes { len } => {
                drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(buffer as *mut u8, len)) });
            }
            Allocation::Packages { count, .. } => {
                drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(buffer as *mut SecPkgInfoW, count)) });
            }
        }

        state.freed_buffers += 1;

        state.release_status
    }

    unsafe fn free_credentials_handle(&self, credentials: PSecHandle) -> SecurityStatus {
        let mut state = self.state();
        let handle = unsafe { *credentials };

        assert!(state.live_credentials.remove(&handle), "credentials {handle:?} released twice");
        state.releases.push(Release::Credentials(handle));

        state.release_status
    }

    unsafe fn delete_security_context(&self, context: PSecHandle) -> SecurityStatus {
        let mut state = self.state();
        let handle = unsafe { *context };

        assert!(state.live_contexts.remove(&handle), "context {handle:?} deleted twice");
        state.releases.push(Release::Context(handle));

        state.release_status
    }

    unsafe fn enumerate_security_packages(&self, count: *mut u32, packages: *mut PSecPkgInfoW) -> SecurityStatus {
        let mut state = self.state();

        if state.enumerate_status != SEC_E_OK {
            return state.enumerate_status;
        }

        let mut strings = Vec::new();
        let mut infos = Vec::new();
        for package in state.packages.clone() {
            let mut name = package.raw_name.clone().unwrap_or_else(|| to_wide(&package.name));
            let mut comment = to_wide(&package.comment);

            infos.push(SecPkgInfoW {
                f_capabilities: package.capabilities,
                w_version: 1,
                w_rpc_id: 0xA,
                cb_max_token: package.max_token,
                name: name.as_mut_ptr(),
                comment: comment.as_mut_ptr(),
            });

            strings.push(name);
            strings.push(comment);
        }

        let len = infos.len();
        let array = Box::into_raw(infos.into_boxed_slice()) as *mut SecPkgInfoW;
        state.live_buffers.insert(
            array as usize,
            Allocation::Packages {
                count: len,
                _strings: strings,
            },
        );

        unsafe {
            *count = len as u32;
            *packages = array;
        }

        SEC_E_OK
    }
}

/// Collects formatted `tracing` output in memory.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Runs `f` with a `TRACE` level subscriber writing into `self`.
    pub fn capture<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap_or_else(|e| e.into_inner())).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
