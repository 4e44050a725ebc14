//! The include manager: one environment per included file, created before
//! the file is evaluated so cyclic includes terminate, plus the lazily built
//! standard-library environments.

use rustc_hash::FxHashMap;

use tracing::debug;

use super::env::{EnvRef, Environment};
use super::stdlib;

#[derive(Default)]
pub struct EnvManager {
    /// One environment per file path, inserted before evaluation.
    environments: FxHashMap<String, EnvRef>,
    /// Standard-library environments, built on first request.
    libraries: FxHashMap<String, EnvRef>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The environment for `path` and whether it has already been populated.
    /// `false` means the caller must read, parse, and evaluate the file into
    /// the returned environment.
    pub fn get(&mut self, path: &str) -> (EnvRef, bool) {
        if stdlib::is_library(path) {
            let env = self
                .libraries
                .entry(path.to_string())
                .or_insert_with(|| stdlib::build_library(path))
                .clone();
            return (env, true);
        }

        if let Some(env) = self.environments.get(path) {
            debug!(path, "include cache hit");
            return (env.clone(), true);
        }

        let env = Environment::new();
        self.environments.insert(path.to_string(), env.clone());

        (env, false)
    }
}
