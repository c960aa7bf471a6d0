//! Tunables shared by a store, its codec and its apply worker.
//!
//! `StoreOptions` is a plain struct with serde defaults, so an embedding
//! application can keep it in its own config file (the `configio` CLI reads
//! it from TOML) and every field that is absent falls back to the value
//! below.
//!
//! | Field         | Default            |
//! |---------------|--------------------|
//! | `max_depth`   | `64`               |
//! | `pretty_json` | `true`             |
//! | `worker_name` | `"configio-apply"` |

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StoreError;

/// Runtime options for a [`crate::ConfigStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreOptions {
    /// Deepest `<map>` / JSON object nesting accepted by the decoders and
    /// produced by the encoders.  The document root counts as level 1, so
    /// the value must be at least 1.
    #[serde(
        default = "default_max_depth",
        deserialize_with = "deserialize_max_depth"
    )]
    pub max_depth: usize,

    /// Indent JSON output.  Has no effect on XML, which is always indented.
    #[serde(default = "default_true")]
    pub pretty_json: bool,

    /// Thread name given to the background apply worker.
    #[serde(default = "default_worker_name")]
    pub worker_name: String,
}

fn default_max_depth() -> usize {
    64
}
fn default_true() -> bool {
    true
}
fn default_worker_name() -> String {
    "configio-apply".to_string()
}

fn deserialize_max_depth<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let depth = usize::deserialize(deserializer)?;
    if depth == 0 {
        return Err(serde::de::Error::custom(
            "max_depth must be at least 1 (the root map is level 1)",
        ));
    }
    Ok(depth)
}

impl StoreOptions {
    /// Checks limits that the type system cannot express.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidOptions`] when `max_depth` is 0, which would
    /// reject even an empty document.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.max_depth == 0 {
            return Err(StoreError::InvalidOptions {
                reason: "max_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            pretty_json: default_true(),
            worker_name: default_worker_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = StoreOptions::default();
        assert_eq!(options.max_depth, 64);
        assert!(options.pretty_json);
        assert_eq!(options.worker_name, "configio-apply");
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        // Act
        let options: StoreOptions = toml::from_str("").expect("deserialize empty");

        // Assert
        assert_eq!(options, StoreOptions::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_fields() {
        // Arrange
        let text = "max_depth = 8\n";

        // Act
        let options: StoreOptions = toml::from_str(text).expect("deserialize partial");

        // Assert
        assert_eq!(options.max_depth, 8);
        assert!(options.pretty_json);
    }

    #[test]
    fn test_zero_max_depth_is_rejected() {
        // Act
        let parsed = toml::from_str::<StoreOptions>("max_depth = 0\n");
        let built = StoreOptions {
            max_depth: 0,
            ..StoreOptions::default()
        };

        // Assert
        let err = parsed.unwrap_err();
        assert!(err.to_string().contains("max_depth must be at least 1"));
        assert!(matches!(
            built.validate(),
            Err(StoreError::InvalidOptions { .. })
        ));
        assert!(StoreOptions::default().validate().is_ok());
    }

    #[test]
    fn test_options_round_trip_through_toml() {
        let options = StoreOptions {
            max_depth: 3,
            pretty_json: false,
            worker_name: "flush".to_string(),
        };

        let text = toml::to_string_pretty(&options).expect("serialize");
        let restored: StoreOptions = toml::from_str(&text).expect("deserialize");

        assert_eq!(options, restored);
    }
}
