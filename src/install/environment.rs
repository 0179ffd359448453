//! Search-path storage backends
//!
//! The registrar never touches the environment directly; it goes through an
//! [`EnvironmentStore`] so tests can swap in [`MemoryEnvironment`].

use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Read/write access to one search-path value
pub trait EnvironmentStore {
    /// Current value, `None` when the variable is not set
    fn read(&self) -> io::Result<Option<String>>;

    /// Replace the value
    fn write(&self, value: &str) -> io::Result<()>;

    /// Tell the rest of the system the value changed
    fn notify_changed(&self) {}
}

/// `PATH` of the running process (not persisted)
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl EnvironmentStore for ProcessEnvironment {
    fn read(&self) -> io::Result<Option<String>> {
        Ok(std::env::var_os("PATH").map(|v| v.to_string_lossy().into_owned()))
    }

    fn write(&self, value: &str) -> io::Result<()> {
        // SAFETY: the pipeline runs on a single thread and every stage that
        // could read the environment concurrently (network, extraction) has
        // already completed when the search path is updated.
        unsafe { std::env::set_var("PATH", value) };
        Ok(())
    }
}

/// In-memory store, used where the real environment must not be touched
#[derive(Debug, Default)]
pub struct MemoryEnvironment {
    value: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryEnvironment {
    pub fn new(value: Option<&str>) -> Self {
        Self {
            value: Mutex::new(value.map(str::to_string)),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Number of successful `write` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl EnvironmentStore for MemoryEnvironment {
    fn read(&self) -> io::Result<Option<String>> {
        self.value
            .lock()
            .map(|v| v.clone())
            .map_err(|_| io::Error::other("environment lock poisoned"))
    }

    fn write(&self, value: &str) -> io::Result<()> {
        let mut guard = self
            .value
            .lock()
            .map_err(|_| io::Error::other("environment lock poisoned"))?;
        *guard = Some(value.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Persistent store on hosts that have no supported API for it
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEnvironment;

impl EnvironmentStore for UnavailableEnvironment {
    fn read(&self) -> io::Result<Option<String>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "persistent user environment is not available on this host",
        ))
    }

    fn write(&self, _value: &str) -> io::Result<()> {
        self.read().map(|_| ())
    }
}

/// Persistent per-user search path of the host
///
/// Registry-backed on windows; unavailable elsewhere, where the registrar only
/// prints instructions.
pub fn user_environment() -> Box<dyn EnvironmentStore> {
    #[cfg(windows)]
    {
        Box::new(super::windows::UserRegistryEnvironment)
    }

    #[cfg(not(windows))]
    {
        Box::new(UnavailableEnvironment)
    }
}
