//! Elevation check. Any failure to query the OS counts as "not elevated".

/// Check if the current process runs with administrative rights.
pub fn is_elevated() -> bool {
    #[cfg(windows)]
    {
        use std::mem::MaybeUninit;
        use std::ptr;

        unsafe {
            use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
            use windows_sys::Win32::Security::{
                GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
            };
            use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

            let mut token: HANDLE = ptr::null_mut();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
                return false;
            }

            let mut elevation = MaybeUninit::<TOKEN_ELEVATION>::uninit();
            let mut returned: u32 = 0;
            let ok = GetTokenInformation(
                token,
                TokenElevation,
                elevation.as_mut_ptr() as *mut _,
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned,
            );
            CloseHandle(token);

            if ok == 0 {
                return false;
            }
            elevation.assume_init().TokenIsElevated != 0
        }
    }

    #[cfg(unix)]
    {
        unsafe { libc::geteuid() == 0 }
    }

    #[cfg(not(any(windows, unix)))]
    {
        false
    }
}
