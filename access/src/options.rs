// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Named option registry.
//!
//! Backends declare the options they understand (with a default and a line of
//! help text) when they are registered with a session. The surrounding program
//! then sets values, typically from `name=value` command line arguments, before
//! the session picks and initializes a backend.

use ordermap::OrderMap;
use tracing::{debug, warn};

/// One declared option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionEntry {
    default: String,
    help: String,
    value: Option<String>,
}

impl OptionEntry {
    /// The value a backend will see: the explicit value if set, else the default.
    #[must_use]
    pub fn effective(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.default)
    }

    /// The declared default.
    #[must_use]
    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Help text for listings.
    #[must_use]
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Returns true if a value was set explicitly.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Errors raised while setting options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    /// No backend declared an option by this name.
    #[error("unknown option {0:?}")]
    Unknown(String),
    /// Not of the form `name=value`.
    #[error("invalid option assignment {0:?} (expected name=value)")]
    Syntax(String),
}

/// Registry of declared options, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Options {
    entries: OrderMap<String, OptionEntry>,
}

impl Options {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an option.
    ///
    /// Declaring the same name twice keeps the original position and any value
    /// already set, but takes the new default and help text.
    pub fn define(&mut self, name: &str, default: &str, help: &str) {
        match self.entries.get_mut(name) {
            Some(existing) => {
                warn!("option {name} has been multiply defined");
                existing.default = default.to_string();
                existing.help = help.to_string();
            }
            None => {
                debug!("defining option {name} (default {default:?})");
                self.entries.insert(
                    name.to_string(),
                    OptionEntry {
                        default: default.to_string(),
                        help: help.to_string(),
                        value: None,
                    },
                );
            }
        }
    }

    /// Looks up the effective value of an option.
    ///
    /// Returns `None` only if the option was never declared.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(OptionEntry::effective)
    }

    /// Looks up the full declaration of an option.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&OptionEntry> {
        self.entries.get(name)
    }

    /// Sets the value of a declared option.
    ///
    /// # Errors
    ///
    /// [`OptionError::Unknown`] if `name` was never declared.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), OptionError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| OptionError::Unknown(name.to_string()))?;
        entry.value = Some(value.into());
        Ok(())
    }

    /// Applies a `name=value` assignment.
    ///
    /// Everything after the first `=` is the value, so values may themselves
    /// contain `=`.
    ///
    /// # Errors
    ///
    /// [`OptionError::Syntax`] if there is no `=` or the name is empty, and
    /// [`OptionError::Unknown`] if the name was never declared.
    pub fn set_assignment(&mut self, assignment: &str) -> Result<(), OptionError> {
        match assignment.split_once('=') {
            Some((name, value)) if !name.is_empty() => self.set(name, value),
            _ => Err(OptionError::Syntax(assignment.to_string())),
        }
    }

    /// Iterates over declarations in the order they were made.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Number of declared options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::options::{OptionError, Options};

    #[test]
    fn defaults_until_set() {
        let mut options = Options::new();
        options.define("dump.name", "", "Name of the bus dump file to read from");
        assert_eq!(options.get("dump.name"), Some(""));
        assert!(!options.entry("dump.name").unwrap().is_set());
        options.set("dump.name", "/tmp/x").unwrap();
        assert_eq!(options.get("dump.name"), Some("/tmp/x"));
        assert_eq!(options.entry("dump.name").unwrap().default_value(), "");
        assert_eq!(options.get("nope"), None);
    }

    #[test]
    fn unknown_options_are_refused() {
        let mut options = Options::new();
        assert_eq!(
            options.set("dump.name", "x"),
            Err(OptionError::Unknown("dump.name".to_string()))
        );
    }

    #[test]
    fn assignments() {
        let mut options = Options::new();
        options.define("a.b", "1", "help");
        options.set_assignment("a.b=x=y").unwrap();
        assert_eq!(options.get("a.b"), Some("x=y"));
        options.set_assignment("a.b=").unwrap();
        assert_eq!(options.get("a.b"), Some(""));
        assert_eq!(
            options.set_assignment("a.b"),
            Err(OptionError::Syntax("a.b".to_string()))
        );
        assert_eq!(
            options.set_assignment("=x"),
            Err(OptionError::Syntax("=x".to_string()))
        );
    }

    #[test]
    #[traced_test]
    fn redefinition_keeps_order_and_value() {
        let mut options = Options::new();
        options.define("first", "1", "one");
        options.define("second", "2", "two");
        options.set("first", "set").unwrap();
        options.define("first", "10", "ten");
        let names: Vec<_> = options.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(options.get("first"), Some("set"));
        assert_eq!(options.entry("first").unwrap().help(), "ten");
        assert!(logs_contain("option first has been multiply defined"));
    }
}
