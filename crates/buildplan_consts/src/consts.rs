use std::sync::LazyLock;

use console::Style;

/// The file name a configuration file is expected to have when it is
/// discovered next to a manifest.
pub const CONFIG_FILE: &str = "buildplan.toml";

/// Overrides the namespace policy of every loaded configuration.
pub const NAMESPACE_POLICY_ENV: &str = "BUILDPLAN_NAMESPACE_POLICY";

/// Prefix that marks a reference as relative to the root namespace.
pub const ROOT_PREFIX: &str = "//";

/// Separates the namespace from the target name in an address.
pub const NAME_SEPARATOR: char = ':';

/// Separates the components of a namespace.
pub const NAMESPACE_SEPARATOR: char = '/';

/// Source patterns starting with this character exclude files instead of
/// including them.
pub const EXCLUDE_PREFIX: &str = "!";

pub static TARGET_STYLE: LazyLock<Style> = LazyLock::new(|| Style::new().blue());
