//! Run Configuration
//!
//! [`RunOptions`] controls a single call to [`validate`](crate::validate).
//! Options can be built in code or loaded from YAML:
//!
//! ```yaml
//! fail_fast: true
//! run_picked_only: false
//! order:
//!   kind: random
//!   seed: "k3j9"
//! ```
//!
//! Every field is optional; a random order without a seed gets a fresh one.

use crate::order::OrderProvider;
use crate::result::{ComprobarError, ComprobarResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options for one validation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Stop validating after the first example with a failure
    pub fail_fast: bool,
    /// Validate only picked examples, even when none is picked
    pub run_picked_only: bool,
    /// Ordering of behaviors and examples
    pub order: OrderProvider,
}

impl RunOptions {
    /// Create default options: declaration order, no fail-fast
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fail-fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Set picked-only
    #[must_use]
    pub const fn with_run_picked_only(mut self, run_picked_only: bool) -> Self {
        self.run_picked_only = run_picked_only;
        self
    }

    /// Set the order
    #[must_use]
    pub const fn with_order(mut self, order: OrderProvider) -> Self {
        self.order = order;
        self
    }

    /// Parse options from YAML text
    pub fn from_yaml_str(yaml: &str) -> ComprobarResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load options from a YAML file
    pub fn from_path(path: &Path) -> ComprobarResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| {
            ComprobarError::config(format!("cannot read {}: {error}", path.display()))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Render options as YAML
    pub fn to_yaml(&self) -> ComprobarResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::order::Seed;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = RunOptions::new();
        assert!(!options.fail_fast);
        assert!(!options.run_picked_only);
        assert_eq!(options.order, OrderProvider::Declaration);
    }

    #[test]
    fn test_builders() {
        let options = RunOptions::new()
            .with_fail_fast(true)
            .with_run_picked_only(true)
            .with_order(OrderProvider::Random(Seed::from_i64(5)));
        assert!(options.fail_fast);
        assert!(options.run_picked_only);
        assert_eq!(options.order.seed(), Some(Seed::from_i64(5)));
    }

    #[test]
    fn test_from_yaml_with_seed() {
        let options = RunOptions::from_yaml_str(
            "fail_fast: true\norder:\n  kind: random\n  seed: \"10\"\n",
        )
        .unwrap();
        assert!(options.fail_fast);
        assert_eq!(options.order, OrderProvider::Random(Seed::from_i64(32)));
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RunOptions::from_yaml_str("").unwrap(), RunOptions::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let err = RunOptions::from_yaml_str("fail_fsat: true\n").unwrap_err();
        assert!(matches!(err, ComprobarError::Yaml(_)));
    }

    #[test]
    fn test_yaml_round_trip_keeps_seed() {
        let options = RunOptions::new().with_order(OrderProvider::Random(Seed::from_i64(-7)));
        let yaml = options.to_yaml().unwrap();
        assert_eq!(RunOptions::from_yaml_str(&yaml).unwrap(), options);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "run_picked_only: true").unwrap();
        let options = RunOptions::from_path(file.path()).unwrap();
        assert!(options.run_picked_only);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunOptions::from_path(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ComprobarError::Config { .. }));
    }
}
