//! Small Win32 helpers shared by the platform backends.

/// NUL-terminated UTF-16 for Win32 string parameters.
pub fn widestring(value: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(value)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}
