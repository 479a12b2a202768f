//! Owning the interpreter from boot onward.

use std::sync::Arc;

use pyhost_resolve::SourceResolver;
use pyhost_vfs::InterpreterFs;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::bootstrap::{bootstrap_source, import_source, module_name, INVALIDATE_CACHES};
use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::interpreter::{
    stderr_sink, stdout_sink, Globals, HostModule, ImageLoader, ImageOptions, Interpreter,
    LineSink,
};
use crate::writer::VirtualFileWriter;

struct Loaded {
    interpreter: Arc<dyn Interpreter>,
    globals: Arc<dyn Globals>,
    writer: VirtualFileWriter,
}

/// The interpreter and everything that feeds it.
///
/// Every operation except [`load_interpreter`](Self::load_interpreter) fails
/// with [`RuntimeError::NotLoaded`] until the interpreter has been loaded.
///
/// # Example
///
/// ```ignore
/// let config = RuntimeConfig::from_file("pyhost.json")?;
/// let resolver = config.build_resolver(picker)?;
/// let runtime = InterpreterLifecycle::new(config, loader, Arc::new(resolver));
///
/// runtime.load_interpreter().await?;
/// runtime.install_package(&["attrs"]).await?;
/// runtime.load_from_file("app/main.py", "app/main.py").await?;
/// runtime.run("import app.main").await?;
/// ```
pub struct InterpreterLifecycle {
    config: RuntimeConfig,
    loader: Arc<dyn ImageLoader>,
    resolver: Arc<SourceResolver>,
    stdout: LineSink,
    stderr: LineSink,
    state: OnceCell<Loaded>,
}

impl InterpreterLifecycle {
    pub fn new(
        config: RuntimeConfig,
        loader: Arc<dyn ImageLoader>,
        resolver: Arc<SourceResolver>,
    ) -> Self {
        Self {
            config,
            loader,
            resolver,
            stdout: stdout_sink(),
            stderr: stderr_sink(),
            state: OnceCell::new(),
        }
    }

    /// Send interpreter output somewhere other than the log.
    pub fn with_sinks(mut self, stdout: LineSink, stderr: LineSink) -> Self {
        self.stdout = stdout;
        self.stderr = stderr;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<SourceResolver> {
        &self.resolver
    }

    pub fn is_loaded(&self) -> bool {
        self.state.initialized()
    }

    /// Boot the interpreter, load the package installer and run the bootstrap.
    ///
    /// Only the first successful call does any work. A failure leaves the
    /// lifecycle unloaded; nothing is retried.
    pub async fn load_interpreter(&self) -> Result<()> {
        self.state
            .get_or_try_init(|| async {
                let options = ImageOptions {
                    stdout: self.stdout.clone(),
                    stderr: self.stderr.clone(),
                    full_stdlib: self.config.full_stdlib,
                    index_url: self.config.index_url.clone(),
                };
                tracing::info!("Loading interpreter image ({:?})", options);
                let interpreter = self.loader.load(options).await?;

                let installer = &self.config.installer_global;
                tracing::debug!("Loading package installer {}", installer);
                interpreter
                    .load_package(std::slice::from_ref(installer), self.stdout.clone())
                    .await?;
                interpreter.run(&bootstrap_source(installer)).await?;

                if !self.config.preload_packages.is_empty() {
                    tracing::debug!("Preloading {:?}", self.config.preload_packages);
                    interpreter
                        .load_package(&self.config.preload_packages, self.stdout.clone())
                        .await?;
                }

                let globals = interpreter.globals();
                let writer = VirtualFileWriter::new(interpreter.fs(), self.resolver.clone());
                tracing::info!("Interpreter ready");
                Ok::<_, RuntimeError>(Loaded {
                    interpreter,
                    globals,
                    writer,
                })
            })
            .await?;
        Ok(())
    }

    fn loaded(&self) -> Result<&Loaded> {
        self.state.get().ok_or(RuntimeError::NotLoaded)
    }

    /// Execute source text and return the interpreter's resulting value.
    pub async fn run(&self, code: &str) -> Result<Value> {
        self.loaded()?.interpreter.run(code).await
    }

    /// Expose `module` to the interpreter as importable module `name`.
    pub fn register_js_module(&self, name: &str, module: HostModule) -> Result<()> {
        tracing::debug!("Registering host module {}", name);
        self.loaded()?.interpreter.register_module(name, module)
    }

    /// Load interpreter-level packages. Progress lines go to the stdout sink.
    pub async fn load_package(&self, names: &[&str]) -> Result<()> {
        let loaded = self.loaded()?;
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        loaded
            .interpreter
            .load_package(&names, self.stdout.clone())
            .await
    }

    /// Install third-party packages through the interpreter's package installer.
    ///
    /// The installer is released afterwards whether or not the install worked.
    pub async fn install_package(&self, names: &[&str]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let loaded = self.loaded()?;
        let name = &self.config.installer_global;
        let installer = loaded
            .globals
            .package_installer(name)
            .ok_or_else(|| RuntimeError::Installer { name: name.clone() })?;

        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        tracing::info!("Installing {}", names.join(", "));
        let result = installer.install(&names).await;
        installer.destroy();
        result
    }

    /// Materialize `source` at `target` in the interpreter filesystem.
    pub async fn load_from_file(&self, target: &str, source: &str) -> Result<()> {
        Ok(self.loaded()?.writer.load_from_file(target, source).await?)
    }

    /// Materialize `path` and import it as a module.
    ///
    /// The import system's caches are invalidated first so a rewritten file
    /// is picked up.
    pub async fn import_from_file(&self, path: &str) -> Result<Value> {
        self.load_from_file(path, path).await?;
        let loaded = self.loaded()?;
        loaded.interpreter.run(INVALIDATE_CACHES).await?;
        let module = module_name(path, &self.config.source_extension);
        loaded.interpreter.run(&import_source(&module)).await
    }

    /// The interpreter's private filesystem.
    pub fn fs(&self) -> Result<Arc<dyn InterpreterFs>> {
        Ok(self.loaded()?.interpreter.fs())
    }

    pub fn globals(&self) -> Result<Arc<dyn Globals>> {
        Ok(self.loaded()?.globals.clone())
    }
}
