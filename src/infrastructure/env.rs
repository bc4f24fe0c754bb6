//! Environment variable sources for `$NAME` arguments.

use std::collections::HashMap;
use std::path::Path;

/// Read access to environment variables by exact name.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables; useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Process environment layered over the entries of a `.env` file.
///
/// Process values win. The file is read once and the process environment is
/// never modified.
#[derive(Debug, Clone, Default)]
pub struct DotenvEnv {
    file: HashMap<String, String>,
}

impl DotenvEnv {
    /// Load `.env` from the current directory or its ancestors. A missing file
    /// yields an empty layer.
    pub fn discover() -> Result<Self, dotenvy::Error> {
        match dotenvy::dotenv_iter() {
            Ok(iter) => Self::collect(iter),
            Err(err) if err.not_found() => Ok(Self::default()),
            Err(err) => Err(err),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, dotenvy::Error> {
        Self::collect(dotenvy::from_path_iter(path)?)
    }

    fn collect<R: std::io::Read>(iter: dotenvy::Iter<R>) -> Result<Self, dotenvy::Error> {
        let file = iter.collect::<Result<HashMap<_, _>, _>>()?;
        tracing::debug!(entries = file.len(), "Loaded .env entries");
        Ok(Self { file })
    }
}

impl EnvSource for DotenvEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name)
            .ok()
            .or_else(|| self.file.get(name).cloned())
    }
}
