use std::path::Path;

use buildplan::{BuildContext, BuildError, Target, TargetDeclaration, consts};
use serde::Deserialize;
use tempfile::TempDir;

/// The shape of a manifest as the tests write it: an array of `[[target]]`
/// tables.
#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    target: Vec<TargetDeclaration>,
}

/// A temporary workspace with an optional `buildplan.toml`.
pub struct WorkspaceControl {
    tmpdir: TempDir,
}

impl WorkspaceControl {
    pub fn new() -> Self {
        init_tracing();
        Self {
            tmpdir: tempfile::tempdir().unwrap(),
        }
    }

    /// Creates a workspace with the given config file contents.
    pub fn with_config(config: &str) -> Self {
        let workspace = Self::new();
        fs_err::write(workspace.root().join(consts::CONFIG_FILE), config).unwrap();
        workspace
    }

    pub fn root(&self) -> &Path {
        self.tmpdir.path()
    }

    pub fn context(&self) -> BuildContext {
        BuildContext::from_root(self.root()).unwrap()
    }
}

/// Parses a manifest and registers its targets in `namespace`.
pub fn declare(
    context: &BuildContext,
    namespace: &str,
    manifest: &str,
) -> Result<Vec<std::sync::Arc<Target>>, BuildError> {
    let manifest: Manifest = toml_edit::de::from_str(manifest).unwrap();
    context.register(namespace, manifest.target)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
