use std::string::FromUtf16Error;

use crate::sspi_data_types::SecWChar;

pub fn str_to_win_wstring(value: &str) -> Vec<SecWChar> {
    value.encode_utf16().chain(std::iter::once(0)).collect::<Vec<_>>()
}

/// Reads a nul-terminated UTF-16 string. A null pointer reads as an empty string.
///
/// # Safety
///
/// `ptr` is either null or points to a nul-terminated UTF-16 string.
pub unsafe fn wide_ptr_to_string(ptr: *const SecWChar) -> Result<String, FromUtf16Error> {
    if ptr.is_null() {
        return Ok(String::new());
    }

    let mut len = 0;
    // SAFETY: the string is nul-terminated, so every read up to and including the terminator is in bounds.
    while unsafe { *ptr.add(len) } != 0 {
        len += 1;
    }

    // SAFETY: `len` elements were just read from `ptr`.
    let s = unsafe { std::slice::from_raw_parts(ptr, len) };

    String::from_utf16(s)
}
