//! Dotted-key configuration, loaded from TOML with `$VAR` environment
//! expansion applied lazily to string leaves on read.
//!
//! Mirrors the original engine's `Config::Get<T>("a.b.c")` dotted-path
//! walk, re-expressed over a parsed [`toml::Value`] instead of JSON.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{EngineError, Result};

pub struct Config {
    root: toml::Value,
}

impl Config {
    pub fn from_str(text: &str) -> Result<Self> {
        let root: toml::Value = toml::from_str(text)?;
        Ok(Self { root })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    fn node(&self, dotted_key: &str) -> Result<&toml::Value> {
        let mut cur = &self.root;
        for segment in dotted_key.split('.') {
            cur = cur
                .get(segment)
                .ok_or_else(|| EngineError::NotFound(format!("config key `{dotted_key}`")))?;
        }
        Ok(cur)
    }

    /// Fetches and deserializes the value at `dotted_key`. String leaves are
    /// passed through [`expand_env`] first.
    pub fn get<T: DeserializeOwned>(&self, dotted_key: &str) -> Result<T> {
        let node = self.node(dotted_key)?;
        let node = match node.as_str() {
            Some(s) => toml::Value::String(expand_env(s)),
            None => node.clone(),
        };
        node.try_into()
            .map_err(|e| EngineError::InvalidArgument(format!("config key `{dotted_key}`: {e}")))
    }

    pub fn get_or<T: DeserializeOwned>(&self, dotted_key: &str, default: T) -> T {
        self.get(dotted_key).unwrap_or(default)
    }
}

/// Expands `$VAR` references using the process environment. A missing
/// variable is left as literal text and logged once rather than panicking.
pub fn expand_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        while let Some(&(_, nc)) = chars.peek() {
            if nc.is_ascii_alphanumeric() || nc == '_' {
                name.push(nc);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            out.push('$');
            continue;
        }
        match std::env::var(&name) {
            Ok(value) => out.push_str(&value),
            Err(_) => {
                tracing::warn!(var = %name, "config references unset environment variable");
                out.push('$');
                out.push_str(&name);
            }
        }
    }
    out
}
