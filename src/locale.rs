//! Startup check that every required locale is installed.
//!
//! [`LocaleAvailabilityChecker::check_all`] probes every required locale and
//! reports all missing ones in a single [`MissingLocalesError`], so one run
//! gives the full list to install.
//!
//! Locale names are compared after normalisation:
//!
//! | required       | installed        | match |
//! |----------------|------------------|-------|
//! | `en_US.UTF-8`  | `en_US.utf8`     | yes   |
//! | `en_US`        | `en_US.iso88591` | yes   |
//! | `en_US.UTF-8`  | `en_US`          | no    |
//! | `de_DE@euro`   | `de_DE`          | no    |

use std::collections::HashSet;
use std::fmt;
use std::process::Command;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info};

/// Where operators are sent when locales are missing.
pub const DEFAULT_DOCUMENTATION_URL: &str = "docs/troubleshooting.md#missing-locales";

/// Failure of a single locale probe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocaleError {
    #[error("locale \"{0}\" is not installed")]
    NotInstalled(String),
    #[error("\"{0}\" is not a valid locale name")]
    InvalidName(String),
    #[error("could not list installed locales: {0}")]
    ListUnavailable(String),
}

/// Every required locale that failed its probe.
#[derive(Error, Debug)]
#[error(
    "required locales {} are not available on this system; see {documentation_url}",
    quoted_list(.locales)
)]
pub struct MissingLocalesError {
    pub locales: Vec<String>,
    pub documentation_url: String,
    #[source]
    pub first: LocaleError,
}

fn quoted_list(locales: &[String]) -> String {
    locales
        .iter()
        .map(|locale| format!("\"{locale}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Locale names
// ============================================================================

/// A parsed `language[_territory][.codeset][@modifier]` name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocaleName {
    base: String,
    codeset: Option<String>,
    modifier: Option<String>,
}

impl LocaleName {
    pub fn parse(name: &str) -> Result<Self, LocaleError> {
        let invalid = || LocaleError::InvalidName(name.to_string());
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let (rest, modifier) = match trimmed.split_once('@') {
            Some((rest, modifier)) if !modifier.is_empty() => (rest, Some(modifier.to_string())),
            Some(_) => return Err(invalid()),
            None => (trimmed, None),
        };
        let (base, codeset) = match rest.split_once('.') {
            Some((base, codeset)) if !codeset.is_empty() => (base, Some(normalize_codeset(codeset))),
            Some(_) => return Err(invalid()),
            None => (rest, None),
        };
        if base.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            base: base.to_string(),
            codeset,
            modifier,
        })
    }

    /// Whether an installed locale satisfies this requirement.
    pub fn satisfied_by(&self, installed: &LocaleName) -> bool {
        self.base == installed.base
            && self.modifier == installed.modifier
            && match &self.codeset {
                Some(codeset) => installed.codeset.as_ref() == Some(codeset),
                None => true,
            }
    }
}

/// Canonical spelling of a required name; unparseable names stay as given.
fn dedup_key(name: &str) -> String {
    LocaleName::parse(name)
        .map(|parsed| parsed.to_string())
        .unwrap_or_else(|_| name.to_string())
}

/// `UTF-8`, `utf8` and `Utf_8` all name the same codeset.
fn normalize_codeset(codeset: &str) -> String {
    codeset
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl fmt::Display for LocaleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if let Some(codeset) = &self.codeset {
            write!(f, ".{codeset}")?;
        }
        if let Some(modifier) = &self.modifier {
            write!(f, "@{modifier}")?;
        }
        Ok(())
    }
}

/// The set of locales present on a host.
#[derive(Debug, Clone, Default)]
pub struct InstalledLocales {
    names: Vec<LocaleName>,
}

impl InstalledLocales {
    /// Unparsable names are skipped.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .filter_map(|name| LocaleName::parse(name.as_ref()).ok())
                .collect(),
        }
    }

    /// Run `locale -a`.
    pub fn from_system() -> Result<Self, LocaleError> {
        let output = Command::new("locale")
            .arg("-a")
            .output()
            .map_err(|err| LocaleError::ListUnavailable(format!("failed to run `locale -a`: {err}")))?;
        if !output.status.success() {
            return Err(LocaleError::ListUnavailable(format!(
                "`locale -a` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(Self::from_names(String::from_utf8_lossy(&output.stdout).lines()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, required: &LocaleName) -> bool {
        self.names.iter().any(|installed| required.satisfied_by(installed))
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Answers whether one locale is available.
pub trait LocaleProbe {
    fn probe(&self, locale: &str) -> Result<(), LocaleError>;
}

fn probe_in(installed: &InstalledLocales, locale: &str) -> Result<(), LocaleError> {
    let name = LocaleName::parse(locale)?;
    if installed.contains(&name) {
        Ok(())
    } else {
        Err(LocaleError::NotInstalled(locale.to_string()))
    }
}

/// Probes the host's installed locales, listed once on first use.
#[derive(Debug, Default)]
pub struct SystemLocaleProbe {
    installed: OnceLock<Result<InstalledLocales, LocaleError>>,
}

impl SystemLocaleProbe {
    pub fn new() -> Self {
        Self::default()
    }

    fn installed(&self) -> Result<&InstalledLocales, LocaleError> {
        self.installed
            .get_or_init(|| {
                let installed = InstalledLocales::from_system();
                if let Ok(locales) = &installed {
                    debug!(count = locales.len(), "listed installed locales");
                }
                installed
            })
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl LocaleProbe for SystemLocaleProbe {
    fn probe(&self, locale: &str) -> Result<(), LocaleError> {
        probe_in(self.installed()?, locale)
    }
}

/// Probes a fixed list of locales.
#[derive(Debug, Clone, Default)]
pub struct StaticLocaleProbe {
    installed: InstalledLocales,
}

impl StaticLocaleProbe {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            installed: InstalledLocales::from_names(names),
        }
    }
}

impl LocaleProbe for StaticLocaleProbe {
    fn probe(&self, locale: &str) -> Result<(), LocaleError> {
        probe_in(&self.installed, locale)
    }
}

// ============================================================================
// Checker
// ============================================================================

pub struct LocaleAvailabilityChecker<P> {
    probe: P,
    documentation_url: String,
}

impl<P: LocaleProbe> LocaleAvailabilityChecker<P> {
    pub fn new(probe: P) -> Self {
        Self {
            probe,
            documentation_url: DEFAULT_DOCUMENTATION_URL.to_string(),
        }
    }

    pub fn with_documentation_url(mut self, url: impl Into<String>) -> Self {
        self.documentation_url = url.into();
        self
    }

    /// Probe every required locale, then fail once listing all the missing
    /// ones. Names that parse to the same locale are probed once, under the
    /// first spelling given.
    pub fn check_all<I, S>(&self, required: I) -> Result<(), MissingLocalesError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        let mut first = None;

        for locale in required {
            let locale = locale.as_ref();
            if !seen.insert(dedup_key(locale)) {
                continue;
            }
            match self.probe.probe(locale) {
                Ok(()) => debug!(locale, "locale available"),
                Err(err) => {
                    debug!(locale, error = %err, "locale missing");
                    missing.push(locale.to_string());
                    first.get_or_insert(err);
                }
            }
        }

        match first {
            None => {
                info!(count = seen.len(), "all required locales are available");
                Ok(())
            }
            Some(first) => Err(MissingLocalesError {
                locales: missing,
                documentation_url: self.documentation_url.clone(),
                first,
            }),
        }
    }
}
