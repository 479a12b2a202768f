//! The contracts an interpreter image must satisfy.
//!
//! pyhost does not embed an interpreter itself. An embedding supplies an
//! [`ImageLoader`] that boots one; the lifecycle only talks to it through the
//! traits here. Values crossing the boundary are JSON values.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pyhost_vfs::InterpreterFs;
use serde_json::Value;

use crate::error::Result;

/// A line-oriented output sink.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// A host-side object exposed to the interpreter as a module.
pub type HostModule = Value;

/// Standard output sink that forwards each line to the log at info level.
pub fn stdout_sink() -> LineSink {
    Arc::new(|line: &str| tracing::info!(target: "pyhost::stdout", "{}", line))
}

/// Standard error sink that forwards each line to the log at warn level.
pub fn stderr_sink() -> LineSink {
    Arc::new(|line: &str| tracing::warn!(target: "pyhost::stderr", "{}", line))
}

/// What an image loader is asked for.
#[derive(Clone)]
pub struct ImageOptions {
    pub stdout: LineSink,
    pub stderr: LineSink,
    /// Load the whole standard library rather than the reduced footprint.
    pub full_stdlib: bool,
    /// Package index the image fetches interpreter-level packages from.
    pub index_url: Option<String>,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            stdout: stdout_sink(),
            stderr: stderr_sink(),
            full_stdlib: false,
            index_url: None,
        }
    }
}

impl fmt::Debug for ImageOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageOptions")
            .field("full_stdlib", &self.full_stdlib)
            .field("index_url", &self.index_url)
            .finish_non_exhaustive()
    }
}

/// Boots an interpreter image.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, options: ImageOptions) -> Result<Arc<dyn Interpreter>>;
}

/// A live interpreter.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Execute source text and return its resulting value.
    async fn run(&self, code: &str) -> Result<Value>;

    /// Make `module` importable as `name`. A later registration replaces it.
    fn register_module(&self, name: &str, module: HostModule) -> Result<()>;

    /// Load interpreter-level packages, reporting progress lines to `progress`.
    async fn load_package(&self, names: &[String], progress: LineSink) -> Result<()>;

    /// The interpreter's private filesystem.
    fn fs(&self) -> Arc<dyn InterpreterFs>;

    /// The interpreter's global namespace.
    fn globals(&self) -> Arc<dyn Globals>;
}

/// Read access to the interpreter's global namespace.
pub trait Globals: Send + Sync {
    fn get(&self, name: &str) -> Option<Value>;

    /// The package installer bound to global `name`, if there is one.
    fn package_installer(&self, name: &str) -> Option<Box<dyn PackageInstaller>>;
}

/// A third-party package installer living inside the interpreter.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(&self, names: &[String]) -> Result<()>;

    /// Release the installer's interpreter-side resources.
    fn destroy(self: Box<Self>);
}
