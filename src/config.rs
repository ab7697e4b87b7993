//! Settings resolution.
//!
//! Every setting is looked up by an upper-case, underscore separated name such
//! as `KAFKA_VERSION`. A [`Resolver`] holds an ordered list of lookup
//! strategies and returns the first value any of them produces, falling back
//! to a default. The standard order is:
//!
//! 1. the process environment, keyed by the name itself;
//! 2. [`Properties`] passed as `-D key=value`, keyed by [`property_key`] of the
//!    name (`KAFKA_VERSION` becomes `kafka.version`);
//! 3. the default.

use std::collections::BTreeMap;
use std::env::VarError;
use std::fmt::{self, Display};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::ConfigError;

pub const SCALA_VERSION: &str = "SCALA_VERSION";
pub const KAFKA_VERSION: &str = "KAFKA_VERSION";
pub const WORK_DIR: &str = "KAFKA_WORK_DIR";
pub const DOWNLOAD_URL: &str = "KAFKA_DOWNLOAD_URL";
pub const READINESS_ADDR: &str = "KAFKA_READINESS_ADDR";

pub const DEFAULT_SCALA_VERSION: &str = "2.12";
pub const DEFAULT_KAFKA_VERSION: &str = "2.4.0";

/// Base of the archive mirror, the version directory and file name are appended.
pub const MIRROR: &str = "https://www-eu.apache.org/dist/kafka";

const WORK_DIR_NAME: &str = "kafka-sandbox";

/// Translates a setting name into its property key.
pub fn property_key(name: &str) -> String {
    name.to_lowercase().replace('_', ".")
}

/// Reads a setting from the process environment.
///
/// A variable that is set but not valid UTF-8 still takes precedence over
/// the lower tiers, its value is converted lossily.
pub fn environment(name: &str) -> Option<String> {
    from_var(name, std::env::var(name))
}

fn from_var(name: &str, var: Result<String, VarError>) -> Option<String> {
    match var {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(raw)) => {
            let value = raw.to_string_lossy().into_owned();
            tracing::warn!("{} is not valid UTF-8, using {:?}", name, value);
            Some(value)
        }
    }
}

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Ordered chain of lookup strategies, the first hit wins.
pub struct Resolver {
    lookups: Vec<Lookup>,
}

impl Resolver {
    /// Creates a resolver with no strategies, every lookup yields the default.
    pub fn new() -> Self {
        Self {
            lookups: Vec::new(),
        }
    }

    /// Environment first, then the given properties.
    pub fn system(properties: Properties) -> Self {
        Self::new()
            .lookup(environment)
            .lookup(move |name| properties.get(name).map(str::to_owned))
    }

    /// Appends a strategy with the lowest precedence so far.
    pub fn lookup<F>(mut self, strategy: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookups.push(Box::new(strategy));
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lookups.iter().find_map(|lookup| lookup(name))
    }

    pub fn resolve(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Dotted `key=value` pairs, the equivalent of JVM system properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Looks up the property for a setting name, e.g. `kafka.version` for
    /// `KAFKA_VERSION`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&property_key(name)).map(String::as_str)
    }

    /// Parses a single `key=value` pair.
    pub fn parse_pair(pair: &str) -> Result<(String, String), ConfigError> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(ConfigError::Property(pair.to_string())),
        }
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolved provisioning settings.
///
/// Only the versions, the optional download URL override, and the working
/// directory are stored. Everything else is derived on each call, so the
/// archive and home paths always sit directly below the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    scala_version: String,
    kafka_version: String,
    download_url: Option<String>,
    work_dir: Utf8PathBuf,
}

impl Settings {
    pub fn new(
        scala_version: impl Into<String>,
        kafka_version: impl Into<String>,
        work_dir: impl Into<Utf8PathBuf>,
    ) -> Result<Self, ConfigError> {
        let scala_version = scala_version.into();
        let kafka_version = kafka_version.into();

        check_version(SCALA_VERSION, &scala_version)?;
        check_version(KAFKA_VERSION, &kafka_version)?;

        Ok(Self {
            scala_version,
            kafka_version,
            download_url: None,
            work_dir: work_dir.into(),
        })
    }

    pub fn resolve(resolver: &Resolver) -> Result<Self, ConfigError> {
        let scala_version = resolver.resolve(SCALA_VERSION, DEFAULT_SCALA_VERSION);
        let kafka_version = resolver.resolve(KAFKA_VERSION, DEFAULT_KAFKA_VERSION);

        let work_dir = match resolver.get(WORK_DIR) {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_work_dir()?,
        };

        let settings = Self::new(scala_version, kafka_version, work_dir)?;

        Ok(match resolver.get(DOWNLOAD_URL) {
            Some(url) => settings.with_download_url(url),
            None => settings,
        })
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<Utf8PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = Some(url.into());
        self
    }

    pub fn scala_version(&self) -> &str {
        &self.scala_version
    }

    pub fn kafka_version(&self) -> &str {
        &self.kafka_version
    }

    pub fn work_dir(&self) -> &Utf8Path {
        &self.work_dir
    }

    /// `kafka_<scala>-<kafka>`, the name of the top level archive directory.
    pub fn base_name(&self) -> String {
        format!("kafka_{}-{}", self.scala_version, self.kafka_version)
    }

    pub fn filename(&self) -> String {
        format!("{}.tgz", self.base_name())
    }

    pub fn download_url(&self) -> String {
        match &self.download_url {
            Some(url) => url.clone(),
            None => format!("{MIRROR}/{}/{}", self.kafka_version, self.filename()),
        }
    }

    pub fn archive(&self) -> Utf8PathBuf {
        self.work_dir.join(self.filename())
    }

    pub fn home(&self) -> Utf8PathBuf {
        self.work_dir.join(self.base_name())
    }
}

impl Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Settings(scala_version={}, kafka_version={}, download_url={}, work_dir={})",
            self.scala_version,
            self.kafka_version,
            self.download_url(),
            self.work_dir
        )
    }
}

pub fn default_work_dir() -> Result<Utf8PathBuf, ConfigError> {
    let temp = Utf8PathBuf::try_from(std::env::temp_dir())?;
    Ok(temp.join(WORK_DIR_NAME))
}

fn check_version(name: &str, value: &str) -> Result<(), ConfigError> {
    let valid = !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\']);

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Version(name.to_string(), value.to_string()))
    }
}
