//! Compiler option serialization.
//!
//! Options are kept in insertion order, which is also the order of the
//! generated command line. Names are not validated against the compiler's
//! schema; unknown names are forwarded as written.

use std::fmt;

use serde::{Deserialize, Deserializer};

/// A single compiler option value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Flag(value) => write!(f, "{}", value),
            OptionValue::Number(value) => write!(f, "{}", value),
            OptionValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Flag(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        OptionValue::Number(value.into())
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Number(value.into())
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        OptionValue::Number(value.into())
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Text(value)
    }
}

/// Insertion-ordered mapping from option name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerOptions {
    entries: Vec<(String, OptionValue)>,
}

impl CompilerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`. Re-inserting an existing name replaces its
    /// value but keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder-style [`CompilerOptions::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the options as command line arguments.
    ///
    /// `true` becomes `--name`; every other value becomes `--name=value`.
    pub fn to_args(&self) -> Vec<String> {
        self.iter()
            .map(|(name, value)| match value {
                OptionValue::Flag(true) => format!("--{}", name),
                value => format!("--{}={}", name, value),
            })
            .collect()
    }
}

impl<K, V> FromIterator<(K, V)> for CompilerOptions
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = CompilerOptions::new();
        for (name, value) in iter {
            options.insert(name, value);
        }
        options
    }
}

impl<'de> Deserialize<'de> for CompilerOptions {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // serde_json is built with `preserve_order`, so the map iterates in
        // document order.
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut options = CompilerOptions::new();
        for (name, value) in map {
            let value = OptionValue::deserialize(value).map_err(|_| {
                serde::de::Error::custom(format!(
                    "compiler option `{}` must be a boolean, number or string",
                    name
                ))
            })?;
            options.insert(name, value);
        }
        Ok(options)
    }
}

/// Full option argument list: the serialized options followed by the
/// extension override, if any, as two separate arguments.
pub fn serialize_options(options: &CompilerOptions, file_extension: Option<&str>) -> Vec<String> {
    let mut args = options.to_args();
    if let Some(extension) = file_extension {
        args.push("--extension".to_string());
        args.push(extension.to_string());
    }
    args
}
