//! Option matrix parsing for test runs.
//!
//! An option matrix is a flat `key=value,key2=value2` string handed to a
//! test run. It is parsed once and read-only afterwards.

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;

use crate::{Error, Result};

/// Parsed option matrix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMatrix {
    options: HashMap<String, String>,
}

impl OptionMatrix {
    /// Parse a raw matrix string.
    ///
    /// An empty (or whitespace-only) string yields an empty matrix. Empty
    /// segments left by stray commas are ignored. An entry without `=`, or
    /// with an empty key, is rejected with [`Error::MalformedOption`].
    /// Values keep any further `=` characters verbatim.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut options = HashMap::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::MalformedOption(entry.to_string()))?;

            let key = key.trim();
            if key.is_empty() {
                return Err(Error::MalformedOption(entry.to_string()));
            }

            options.insert(key.to_string(), value.trim().to_string());
        }

        debug!("Parsed opt-matrix with {} options", options.len());
        Ok(Self { options })
    }

    /// Parse an optional matrix string; `None` yields an empty matrix.
    pub fn from_optional(raw: Option<&str>) -> Result<Self> {
        raw.map_or_else(|| Ok(Self::default()), Self::parse)
    }

    /// Confirm every key in `required` is present.
    ///
    /// Presence is what counts: a key mapped to an empty value satisfies
    /// the requirement. Fails naming the first missing key.
    pub fn check_required<S: AsRef<str>>(&self, required: &[S]) -> Result<()> {
        match required
            .iter()
            .map(AsRef::as_ref)
            .find(|key| !self.options.contains_key(*key))
        {
            Some(missing) => Err(Error::MissingOption(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Whether the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Iterate over all options in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromStr for OptionMatrix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
