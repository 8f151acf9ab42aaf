use std::collections::HashMap;

use serde::de::DeserializeOwned;

pub use config::ConfigError;

pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

/// A single place to look up environment-level overrides.
pub trait EnvSource: Send + Sync {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Snapshot of key/value pairs, taken once and consulted by exact key.
#[derive(Debug, Clone, Default)]
pub struct EnvMap {
    vars: HashMap<String, String>,
}

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment.
    pub fn from_env() -> Self {
        std::env::vars().collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for EnvMap {
    fn lookup(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Live process environment. Empty values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Ordered list of [`EnvSource`]s; the first source that knows a key wins.
///
/// ```
/// use sendthis::config::{EnvMap, EnvResolver, ProcessEnv};
///
/// let env = EnvResolver::new()
///     .with_source(EnvMap::new().with("mandrill_sub_account", "tenant-a"))
///     .with_source(ProcessEnv);
///
/// assert_eq!(env.lookup("mandrill_sub_account").as_deref(), Some("tenant-a"));
/// ```
#[derive(Default)]
pub struct EnvResolver {
    sources: Vec<Box<dyn EnvSource>>,
}

impl EnvResolver {
    /// A resolver with no sources. Every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment map snapshot first, then the live process environment.
    /// The snapshot keeps empty values; [`ProcessEnv`] treats them as unset.
    pub fn system() -> Self {
        Self::new()
            .with_source(EnvMap::from_env())
            .with_source(ProcessEnv)
    }

    pub fn with_source(mut self, source: impl EnvSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|source| source.lookup(key))
    }
}

impl std::fmt::Debug for EnvResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvResolver")
            .field("sources", &self.sources.len())
            .finish()
    }
}
