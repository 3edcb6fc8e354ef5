use std::{
    collections::BTreeSet as Set,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
    str::FromStr,
};

use buildplan_consts::consts;
use itertools::Itertools;
use miette::Diagnostic;
use serde::{Deserialize, Serialize, de::IntoDeserializer};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Decides which part of an address has to be unique for two targets to be
/// considered distinct.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NamespacePolicy {
    /// Names are unique within a namespace; `a:lib` and `b:lib` coexist.
    #[default]
    PerNamespace,
    /// Names are unique across all namespaces and references resolve by
    /// name alone.
    Global,
}

impl FromStr for NamespacePolicy {
    type Err = serde::de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s.into_deserializer())
    }
}

impl Display for NamespacePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NamespacePolicy::PerNamespace => write!(f, "per-namespace"),
            NamespacePolicy::Global => write!(f, "global"),
        }
    }
}

/// The default number of targets an executor may work on at once.
/// Defaulting to the number of CPUs available.
fn default_max_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// How target names are scoped.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_policy: Option<NamespacePolicy>,

    /// The maximum number of targets of a single wave that are handed to an
    /// executor at the same time.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// The files this config was assembled from, lowest priority first.
    #[serde(skip)]
    pub loaded_from: Vec<PathBuf>,
}

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigError {
    #[error("no file was found at {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config from '{}'", .0.display())]
    ReadError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config of {}", .1.display())]
    ParseError(#[source] toml_edit::de::Error, PathBuf),

    #[error("invalid value '{value}' for {}", consts::NAMESPACE_POLICY_ENV)]
    #[diagnostic(help("expected 'per-namespace' or 'global'"))]
    InvalidEnvironmentOverride { value: String },

    #[error("max-concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("max-concurrency must be at most {max}, got {value}")]
    ConcurrencyTooLarge { value: usize, max: usize },
}

impl Config {
    /// Parse the given toml string and return a Config instance.
    ///
    /// # Returns
    ///
    /// The parsed config, and the unused keys
    pub fn from_toml(toml: &str) -> Result<(Config, Set<String>), toml_edit::de::Error> {
        let de = toml_edit::de::Deserializer::from_str(toml)?;

        let mut unused_keys = Set::new();
        let config: Config = serde_ignored::deserialize(de, |path| {
            unused_keys.insert(path.to_string());
        })?;

        Ok((config, unused_keys))
    }

    /// Load the config from the given path. Unknown keys are reported as a
    /// warning and otherwise ignored.
    pub fn from_path(path: &Path) -> Result<Config, ConfigError> {
        tracing::debug!("Loading config from {}", path.display());
        let s = match fs_err::read_to_string(path) {
            Ok(content) => content,
            Err(e)
                if e.kind() == std::io::ErrorKind::NotFound
                    || e.kind() == std::io::ErrorKind::NotADirectory =>
            {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::ReadError(path.to_path_buf(), e)),
        };

        let (mut config, unused_keys) =
            Config::from_toml(&s).map_err(|e| ConfigError::ParseError(e, path.to_path_buf()))?;

        if !unused_keys.is_empty() {
            tracing::warn!(
                "Ignoring '{}' in {}",
                console::style(unused_keys.iter().join(", ")).yellow(),
                path.display()
            );
        }

        config.validate()?;
        config.loaded_from.push(path.to_path_buf());
        Ok(config)
    }

    /// Loads and merges the given config files in order, later files take
    /// precedence. Missing files are skipped. The namespace policy can be
    /// overridden with the `BUILDPLAN_NAMESPACE_POLICY` environment variable.
    pub fn load(paths: impl IntoIterator<Item = impl AsRef<Path>>) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        for path in paths {
            let path = path.as_ref();
            match Self::from_path(path) {
                Ok(c) => config = config.merge_config(c),
                Err(ConfigError::FileNotFound(_)) => {
                    tracing::debug!("No config found at {}", path.display())
                }
                Err(e) => return Err(e),
            }
        }

        if let Ok(value) = std::env::var(consts::NAMESPACE_POLICY_ENV) {
            let policy = value
                .parse()
                .map_err(|_| ConfigError::InvalidEnvironmentOverride {
                    value: value.clone(),
                })?;
            tracing::debug!(
                "{} overrides the namespace policy with '{policy}'",
                consts::NAMESPACE_POLICY_ENV
            );
            config.namespace_policy = Some(policy);
        }

        Ok(config)
    }

    /// Loads the config file of a workspace root, see [`Config::load`].
    pub fn load_from_root(root: &Path) -> miette::Result<Config> {
        Ok(Self::load([root.join(consts::CONFIG_FILE)])?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.max_concurrency {
            Some(0) => Err(ConfigError::ZeroConcurrency),
            Some(value) if value > Semaphore::MAX_PERMITS => {
                Err(ConfigError::ConcurrencyTooLarge {
                    value,
                    max: Semaphore::MAX_PERMITS,
                })
            }
            _ => Ok(()),
        }
    }

    /// Merge the `other` config into `self`.
    /// The `other` config will have higher priority
    #[must_use]
    pub fn merge_config(self, mut other: Config) -> Self {
        let mut loaded_from = self.loaded_from;
        loaded_from.append(&mut other.loaded_from);

        Self {
            namespace_policy: other.namespace_policy.or(self.namespace_policy),
            max_concurrency: other.max_concurrency.or(self.max_concurrency),
            loaded_from,
        }
    }

    pub fn namespace_policy(&self) -> NamespacePolicy {
        self.namespace_policy.unwrap_or_default()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or_else(default_max_concurrency)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_parse_config() {
        let (config, unused) = Config::from_toml(
            r#"
            namespace-policy = "global"
            max-concurrency = 4
            UNUSED = "unused"
            "#,
        )
        .unwrap();
        assert_eq!(config.namespace_policy(), NamespacePolicy::Global);
        assert_eq!(config.max_concurrency(), 4);
        assert!(unused.contains("UNUSED"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.namespace_policy(), NamespacePolicy::PerNamespace);
        assert!(config.max_concurrency() >= 1);
    }

    #[rstest]
    #[case("per-namespace", NamespacePolicy::PerNamespace)]
    #[case("global", NamespacePolicy::Global)]
    fn test_policy_round_trip(#[case] input: &str, #[case] expected: NamespacePolicy) {
        let policy: NamespacePolicy = input.parse().unwrap();
        assert_eq!(policy, expected);
        assert_eq!(policy.to_string(), input);
    }

    #[test]
    fn test_merge_config() {
        let base = Config {
            namespace_policy: Some(NamespacePolicy::Global),
            max_concurrency: Some(2),
            loaded_from: vec![PathBuf::from("base.toml")],
        };
        let other = Config {
            namespace_policy: None,
            max_concurrency: Some(8),
            loaded_from: vec![PathBuf::from("other.toml")],
        };

        let merged = base.merge_config(other);
        assert_eq!(merged.namespace_policy(), NamespacePolicy::Global);
        assert_eq!(merged.max_concurrency(), 8);
        assert_eq!(
            merged.loaded_from,
            vec![PathBuf::from("base.toml"), PathBuf::from("other.toml")]
        );
    }

    #[test]
    fn test_load_layers_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        fs_err::write(&first, "namespace-policy = \"global\"\nmax-concurrency = 3\n").unwrap();
        fs_err::write(&second, "max-concurrency = 5\n").unwrap();
        let missing = dir.path().join("missing.toml");

        let config = temp_env::with_var_unset(consts::NAMESPACE_POLICY_ENV, || {
            Config::load([&first, &missing, &second]).unwrap()
        });
        assert_eq!(config.namespace_policy(), NamespacePolicy::Global);
        assert_eq!(config.max_concurrency(), 5);
        assert_eq!(config.loaded_from, vec![first, second]);
    }

    #[test]
    fn test_environment_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(consts::CONFIG_FILE);
        fs_err::write(&path, "namespace-policy = \"global\"\n").unwrap();

        let config = temp_env::with_var(consts::NAMESPACE_POLICY_ENV, Some("per-namespace"), || {
            Config::load([&path]).unwrap()
        });
        assert_eq!(config.namespace_policy(), NamespacePolicy::PerNamespace);

        let err = temp_env::with_var(consts::NAMESPACE_POLICY_ENV, Some("flat"), || {
            Config::load([&path]).unwrap_err()
        });
        assert_matches!(err, ConfigError::InvalidEnvironmentOverride { value } if value == "flat");
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(consts::CONFIG_FILE);
        fs_err::write(&path, "max-concurrency = 0\n").unwrap();
        assert_matches!(Config::from_path(&path), Err(ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_unbounded_concurrency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(consts::CONFIG_FILE);
        fs_err::write(&path, "max-concurrency = 9223372036854775807\n").unwrap();
        assert_matches!(
            Config::from_path(&path),
            Err(ConfigError::ConcurrencyTooLarge { max, .. }) if max == Semaphore::MAX_PERMITS
        );
    }
}
