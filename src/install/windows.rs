//! Registry-backed user environment (`HKEY_CURRENT_USER\Environment`)

use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;

use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, LPARAM, WPARAM};
use windows::Win32::System::Registry::{
    HKEY, HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_EXPAND_SZ, REG_SZ, REG_VALUE_TYPE,
    RegCloseKey, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    HWND_BROADCAST, SMTO_ABORTIFHUNG, SendMessageTimeoutW, WM_SETTINGCHANGE,
};
use windows::core::PCWSTR;

use super::environment::EnvironmentStore;

const ENVIRONMENT_KEY: &str = "Environment";
const PATH_VALUE: &str = "Path";

/// RAII wrapper for Registry key handle
struct RegistryHandle(HKEY);

impl RegistryHandle {
    fn open(access: windows::Win32::System::Registry::REG_SAM_FLAGS) -> io::Result<Self> {
        let key = to_wide(ENVIRONMENT_KEY);
        let mut handle = HKEY::default();
        unsafe {
            RegOpenKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR::from_raw(key.as_ptr()),
                Some(0),
                access,
                &mut handle,
            )
            .ok()
            .map_err(|e| io::Error::other(format!("Failed to open registry key: {e}")))?;
        }
        Ok(Self(handle))
    }

    #[inline]
    fn handle(&self) -> HKEY {
        self.0
    }
}

impl Drop for RegistryHandle {
    #[inline]
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }
}

/// Convert string to wide (UTF-16), nul-terminated
fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

/// Persistent user `Path`, as seen by newly started shells
#[derive(Debug, Default, Clone, Copy)]
pub struct UserRegistryEnvironment;

impl UserRegistryEnvironment {
    /// Current value and its registry type (`REG_EXPAND_SZ` is preserved)
    fn query(&self) -> io::Result<Option<(String, REG_VALUE_TYPE)>> {
        let key = RegistryHandle::open(KEY_READ)?;
        let name = to_wide(PATH_VALUE);
        let mut kind = REG_VALUE_TYPE::default();
        let mut size: u32 = 0;

        let status = unsafe {
            RegQueryValueExW(
                key.handle(),
                PCWSTR::from_raw(name.as_ptr()),
                None,
                Some(&raw mut kind),
                None,
                Some(&raw mut size),
            )
        };
        if status == ERROR_FILE_NOT_FOUND {
            return Ok(None);
        }
        status
            .ok()
            .map_err(|e| io::Error::other(format!("Failed to query user Path: {e}")))?;

        let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
        unsafe {
            RegQueryValueExW(
                key.handle(),
                PCWSTR::from_raw(name.as_ptr()),
                None,
                Some(&raw mut kind),
                Some(buffer.as_mut_ptr().cast()),
                Some(&raw mut size),
            )
            .ok()
            .map_err(|e| io::Error::other(format!("Failed to read user Path: {e}")))?;
        }

        let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
        Ok(Some((String::from_utf16_lossy(&buffer[..len]), kind)))
    }
}

impl EnvironmentStore for UserRegistryEnvironment {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(self.query()?.map(|(value, _)| value))
    }

    fn write(&self, value: &str) -> io::Result<()> {
        let kind = match self.query()? {
            Some((_, kind)) if kind == REG_EXPAND_SZ => REG_EXPAND_SZ,
            _ => REG_SZ,
        };

        let key = RegistryHandle::open(KEY_WRITE)?;
        let name = to_wide(PATH_VALUE);
        let data = to_wide(value);
        let bytes: Vec<u8> = data.iter().flat_map(|c| c.to_le_bytes()).collect();

        unsafe {
            RegSetValueExW(
                key.handle(),
                PCWSTR::from_raw(name.as_ptr()),
                None,
                kind,
                Some(&bytes),
            )
            .ok()
            .map_err(|e| io::Error::other(format!("Failed to write user Path: {e}")))?;
        }
        Ok(())
    }

    /// Broadcast `WM_SETTINGCHANGE` so Explorer picks up the new value
    fn notify_changed(&self) {
        let area = to_wide(ENVIRONMENT_KEY);
        let result = unsafe {
            SendMessageTimeoutW(
                HWND_BROADCAST,
                WM_SETTINGCHANGE,
                WPARAM(0),
                LPARAM(area.as_ptr() as isize),
                SMTO_ABORTIFHUNG,
                5000,
                None,
            )
        };
        if result.0 == 0 {
            log::warn!("Environment change broadcast timed out");
        }
    }
}
