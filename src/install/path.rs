//! Search-path registration for the install directory
//!
//! Windows has a supported API for the persistent per-user search path, so the
//! directory is appended there. Everywhere else shell profiles belong to the
//! user and are never edited; an `export` line is printed instead.

use std::path::Path;

use super::environment::EnvironmentStore;
use super::platform::Os;
use super::progress::Reporter;

/// Advisory outcome of registration; never affects the exit status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Directory already present in the current search path
    AlreadyConfigured,
    /// Directory appended to the persistent user search path
    Registered { already_persisted: bool },
    /// The user has to add the directory themselves
    ManualSetup { instructions: Vec<String> },
    /// Persistent update failed; the install itself is still fine
    Warning { message: String, instructions: Vec<String> },
}

impl Registration {
    pub fn report(&self, reporter: &Reporter) {
        match self {
            Registration::AlreadyConfigured => {
                reporter.success("✓ Install directory already on PATH, no action needed");
            }
            Registration::Registered { already_persisted } => {
                if *already_persisted {
                    reporter.success("✓ Install directory already in user Path");
                } else {
                    reporter.success("✓ Added install directory to user Path");
                }
                reporter.note("   Open a new terminal for other shells to pick it up.");
            }
            Registration::ManualSetup { instructions } => {
                reporter.warn("⚠ Install directory is not on PATH");
                for line in instructions {
                    reporter.note(line);
                }
            }
            Registration::Warning {
                message,
                instructions,
            } => {
                reporter.warn(&format!("⚠ Could not update PATH: {message}"));
                for line in instructions {
                    reporter.note(line);
                }
            }
        }
    }
}

/// Decides and applies the search-path strategy for one OS token
pub struct PathRegistrar<'a> {
    os: Os,
    process: &'a dyn EnvironmentStore,
    user: &'a dyn EnvironmentStore,
    modify_persistent: bool,
    shell: Option<String>,
    variables: Box<dyn Fn(&str) -> Option<String> + 'a>,
}

impl<'a> PathRegistrar<'a> {
    pub fn new(os: Os, process: &'a dyn EnvironmentStore, user: &'a dyn EnvironmentStore) -> Self {
        Self {
            os,
            process,
            user,
            modify_persistent: true,
            shell: std::env::var("SHELL").ok(),
            variables: Box::new(|name: &str| std::env::var(name).ok()),
        }
    }

    /// Report instructions instead of touching the persistent store
    pub fn modify_persistent(mut self, enabled: bool) -> Self {
        self.modify_persistent = enabled;
        self
    }

    /// Login shell used to pick the profile file named in instructions
    pub fn shell(mut self, shell: Option<String>) -> Self {
        self.shell = shell;
        self
    }

    /// Source for `%NAME%` references in Windows search-path entries
    pub fn variables(mut self, lookup: impl Fn(&str) -> Option<String> + 'a) -> Self {
        self.variables = Box::new(lookup);
        self
    }

    fn contains(&self, search_path: &str, dir: &str) -> bool {
        contains_dir_with(self.os, search_path, dir, &*self.variables)
    }

    pub fn register(&self, dir: &Path) -> Registration {
        let dir = dir.to_string_lossy().into_owned();

        let current = match self.process.read() {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                log::warn!("Failed to read process PATH: {e}");
                String::new()
            }
        };
        if self.contains(&current, &dir) {
            return Registration::AlreadyConfigured;
        }

        match self.os {
            Os::Windows if self.modify_persistent => self.register_windows(&dir, &current),
            Os::Windows => Registration::ManualSetup {
                instructions: windows_instructions(&dir),
            },
            Os::MacOs | Os::Linux => Registration::ManualSetup {
                instructions: self.unix_instructions(&dir),
            },
        }
    }

    fn register_windows(&self, dir: &str, current: &str) -> Registration {
        let warning = |message: String| Registration::Warning {
            message,
            instructions: windows_instructions(dir),
        };

        let persisted = match self.user.read() {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => return warning(format!("failed to read user Path: {e}")),
        };

        let already_persisted = self.contains(&persisted, dir);
        if !already_persisted {
            let updated = append_dir(self.os, &persisted, dir);
            if let Err(e) = self.user.write(&updated) {
                return warning(format!("failed to write user Path: {e}"));
            }
            self.user.notify_changed();
            log::info!("Appended {dir} to user Path");
        }

        if let Err(e) = self.process.write(&append_dir(self.os, current, dir)) {
            log::warn!("Failed to update process PATH: {e}");
        }

        Registration::Registered { already_persisted }
    }

    fn unix_instructions(&self, dir: &str) -> Vec<String> {
        let display_dir = home_relative(dir);
        let shell = self
            .shell
            .as_deref()
            .and_then(|s| Path::new(s).file_name())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (profile, line) = match shell.as_str() {
            "fish" => (
                "~/.config/fish/config.fish",
                format!("fish_add_path \"{display_dir}\""),
            ),
            "zsh" => ("~/.zshrc", export_line(&display_dir)),
            "bash" if self.os == Os::MacOs => ("~/.bash_profile", export_line(&display_dir)),
            "bash" => ("~/.bashrc", export_line(&display_dir)),
            _ => ("~/.profile", export_line(&display_dir)),
        };

        vec![
            format!("   Add this line to {profile}:"),
            String::new(),
            format!("       {line}"),
            String::new(),
            "   then restart your shell.".to_string(),
        ]
    }
}

fn export_line(dir: &str) -> String {
    format!("export PATH=\"{dir}:$PATH\"")
}

fn windows_instructions(dir: &str) -> Vec<String> {
    vec![
        "   Add this directory to your user Path environment variable:".to_string(),
        format!("       {dir}"),
    ]
}

/// Shorten `dir` to `$HOME/...` when it lives in the home directory
fn home_relative(dir: &str) -> String {
    if let Some(home) = dirs::home_dir()
        && let Ok(rest) = Path::new(dir).strip_prefix(&home)
    {
        if rest.as_os_str().is_empty() {
            return "$HOME".to_string();
        }
        return format!("$HOME/{}", rest.display());
    }
    dir.to_string()
}

/// Substitute `%NAME%` references the way `REG_EXPAND_SZ` values expand
///
/// Unknown names and unmatched `%` are kept literally.
fn expand_percent_vars(entry: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(entry.len());
    let mut rest = entry;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            rest = &rest[start..];
            break;
        };
        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => {
                out.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                // The closing '%' may open the next reference
                out.push('%');
                out.push_str(name);
                rest = &after[end..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn normalize(os: Os, entry: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let entry = entry.trim();
    match os {
        Os::Windows => expand_percent_vars(entry, lookup)
            .replace('/', "\\")
            .trim_end_matches('\\')
            .to_lowercase(),
        Os::MacOs | Os::Linux => {
            let trimmed = entry.trim_end_matches('/');
            let kept = if trimmed.is_empty() { entry } else { trimmed };
            kept.to_string()
        }
    }
}

/// Whether `dir` is one of the entries of `search_path`
pub fn contains_dir(os: Os, search_path: &str, dir: &str) -> bool {
    contains_dir_with(os, search_path, dir, &|name: &str| std::env::var(name).ok())
}

/// [`contains_dir`] with an explicit source for `%NAME%` references
pub fn contains_dir_with(
    os: Os,
    search_path: &str,
    dir: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> bool {
    let wanted = normalize(os, dir, lookup);
    search_path
        .split(os.path_separator())
        .filter(|entry| !entry.trim().is_empty())
        .any(|entry| normalize(os, entry, lookup) == wanted)
}

/// Append `dir`, adding a separator only when `search_path` is non-empty
pub fn append_dir(os: Os, search_path: &str, dir: &str) -> String {
    let sep = os.path_separator();
    let base = search_path.trim_end_matches(sep);
    if base.is_empty() {
        dir.to_string()
    } else {
        format!("{base}{sep}{dir}")
    }
}
