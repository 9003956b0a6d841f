//! Native window resources behind root peers.
//!
//! A window handle can go stale at any moment (the window is destroyed
//! while an accessibility client still holds its peer).  Implementations
//! report that case as [`BridgeError::ResourceFault`] so callers can tell it
//! apart from every other failure.

use serde::Serialize;

use crate::errors::BridgeError;
use crate::peer::Rect;

/// Window rectangle in screen coordinates, as the OS reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl From<WindowRect> for Rect {
    fn from(rc: WindowRect) -> Self {
        Rect::new(
            rc.left as f64,
            rc.top as f64,
            rc.right as f64 - rc.left as f64,
            rc.bottom as f64 - rc.top as f64,
        )
    }
}

/// A live native window.
pub trait NativeWindow: Send + Sync {
    /// Raw handle; `0` means "no window".
    fn handle(&self) -> isize;

    fn title(&self) -> Result<String, BridgeError>;

    fn rect(&self) -> Result<WindowRect, BridgeError>;
}

#[cfg(windows)]
pub use win32::Win32Window;

#[cfg(windows)]
mod win32 {
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;

    use windows::Win32::Foundation::{GetLastError, SetLastError, ERROR_SUCCESS, HWND, RECT};
    use windows::Win32::UI::WindowsAndMessaging::{GetWindowRect, GetWindowTextW};

    use super::{NativeWindow, WindowRect};
    use crate::errors::BridgeError;

    /// Window titles longer than this are truncated.
    const MAX_TITLE_LEN: usize = 512;

    /// A Win32 top-level window, held by raw handle value.
    #[derive(Debug, Clone, Copy)]
    pub struct Win32Window {
        handle: isize,
    }

    impl Win32Window {
        pub fn new(handle: isize) -> Self {
            Self { handle }
        }

        fn hwnd(&self) -> HWND {
            HWND(self.handle as *mut core::ffi::c_void)
        }
    }

    impl NativeWindow for Win32Window {
        fn handle(&self) -> isize {
            self.handle
        }

        fn title(&self) -> Result<String, BridgeError> {
            let mut buf = [0u16; MAX_TITLE_LEN];
            // GetWindowTextW returns 0 both for an empty title and on failure.
            unsafe { SetLastError(ERROR_SUCCESS) };
            let copied = unsafe { GetWindowTextW(self.hwnd(), &mut buf) };
            if copied <= 0 {
                let last = unsafe { GetLastError() };
                if last != ERROR_SUCCESS {
                    let err: windows::core::Error = last.to_hresult().into();
                    return Err(err.into());
                }
                return Ok(String::new());
            }
            Ok(OsString::from_wide(&buf[..copied as usize])
                .to_string_lossy()
                .into_owned())
        }

        fn rect(&self) -> Result<WindowRect, BridgeError> {
            let mut raw = RECT::default();
            unsafe { GetWindowRect(self.hwnd(), &mut raw) }?;
            Ok(WindowRect {
                left: raw.left,
                top: raw.top,
                right: raw.right,
                bottom: raw.bottom,
            })
        }
    }
}
