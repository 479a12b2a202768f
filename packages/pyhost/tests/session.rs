use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use pyhost::resolve::{DirectoryHandle, MemoryCache, MemoryDirectory, ReqwestFetcher};
use pyhost::runtime::{Globals, ImageOptions, Interpreter, LineSink, PackageInstaller};
use pyhost::{
    DirectoryPicker, ImageLoader, InterpreterFs, InterpreterLifecycle, LocalResolutionContext,
    MemoryFs, RuntimeConfig, SourceResolver,
};

/// An interpreter that only keeps a filesystem and a transcript.
struct Transcript {
    fs: Arc<MemoryFs>,
    lines: Arc<Mutex<Vec<String>>>,
    globals: Arc<Bindings>,
}

struct Bindings {
    values: Mutex<BTreeMap<String, Value>>,
    lines: Arc<Mutex<Vec<String>>>,
}

struct Installer {
    lines: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PackageInstaller for Installer {
    async fn install(&self, names: &[String]) -> pyhost::runtime::Result<()> {
        self.lines
            .lock()
            .unwrap()
            .push(format!("install {}", names.join(" ")));
        Ok(())
    }

    fn destroy(self: Box<Self>) {
        self.lines.lock().unwrap().push("destroy".to_string());
    }
}

impl Globals for Bindings {
    fn get(&self, name: &str) -> Option<Value> {
        self.values.lock().unwrap().get(name).cloned()
    }

    fn package_installer(&self, name: &str) -> Option<Box<dyn PackageInstaller>> {
        self.get(name).map(|_| {
            Box::new(Installer {
                lines: self.lines.clone(),
            }) as Box<dyn PackageInstaller>
        })
    }
}

#[async_trait]
impl Interpreter for Transcript {
    async fn run(&self, code: &str) -> pyhost::runtime::Result<Value> {
        self.lines.lock().unwrap().push(format!("run {}", code.trim().lines().next().unwrap_or("")));
        Ok(Value::Null)
    }

    fn register_module(&self, name: &str, module: Value) -> pyhost::runtime::Result<()> {
        self.globals
            .values
            .lock()
            .unwrap()
            .insert(name.to_string(), module);
        Ok(())
    }

    async fn load_package(&self, names: &[String], progress: LineSink) -> pyhost::runtime::Result<()> {
        for name in names {
            progress(&format!("Loading {}", name));
            self.globals
                .values
                .lock()
                .unwrap()
                .insert(name.clone(), json!(name));
        }
        Ok(())
    }

    fn fs(&self) -> Arc<dyn InterpreterFs> {
        self.fs.clone()
    }

    fn globals(&self) -> Arc<dyn Globals> {
        self.globals.clone()
    }
}

struct Loader(Arc<Transcript>);

#[async_trait]
impl ImageLoader for Loader {
    async fn load(&self, _options: ImageOptions) -> pyhost::runtime::Result<Arc<dyn Interpreter>> {
        Ok(self.0.clone())
    }
}

struct OnePrompt {
    root: MemoryDirectory,
    prompts: Mutex<usize>,
}

#[async_trait]
impl DirectoryPicker for OnePrompt {
    async fn request_directory(&self) -> pyhost::resolve::Result<Arc<dyn DirectoryHandle>> {
        *self.prompts.lock().unwrap() += 1;
        Ok(Arc::new(self.root.clone()))
    }
}

#[tokio::test]
async fn test_local_session() {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let interpreter = Arc::new(Transcript {
        fs: Arc::new(MemoryFs::new()),
        lines: lines.clone(),
        globals: Arc::new(Bindings {
            values: Mutex::new(BTreeMap::new()),
            lines: lines.clone(),
        }),
    });
    let picker = Arc::new(OnePrompt {
        root: MemoryDirectory::new("project")
            .with_file("app/main.py", "import app.util\n")
            .with_file("app/util.py", "X = 1\n"),
        prompts: Mutex::new(0),
    });
    let cache = Arc::new(MemoryCache::new());

    let config = RuntimeConfig::default();
    let resolver = SourceResolver::new(
        config.base_url().unwrap(),
        LocalResolutionContext::new(picker.clone(), cache.clone()),
        Arc::new(ReqwestFetcher::with_default_timeout().unwrap()),
    );
    let runtime =
        InterpreterLifecycle::new(config, Arc::new(Loader(interpreter.clone())), Arc::new(resolver));

    runtime.load_interpreter().await.unwrap();
    runtime
        .register_js_module("host", json!({"name": "test"}))
        .unwrap();
    runtime.install_package(&["attrs"]).await.unwrap();

    runtime.import_from_file("app/main.py").await.unwrap();
    runtime
        .load_from_file("app/util.py", "app/util.py")
        .await
        .unwrap();
    runtime.import_from_file("app/main.py").await.unwrap();

    assert_eq!(*picker.prompts.lock().unwrap(), 1);
    assert_eq!(cache.len(), 2);
    assert_eq!(
        interpreter.fs.tree(),
        vec!["app/", "app/main.py", "app/util.py"]
    );
    assert_eq!(
        runtime.globals().unwrap().get("host"),
        Some(json!({"name": "test"}))
    );

    let lines = lines.lock().unwrap();
    assert_eq!(lines[0], "run import importlib");
    assert!(lines.contains(&"install attrs".to_string()));
    assert_eq!(lines.iter().filter(|l| *l == "destroy").count(), 1);
    assert_eq!(
        lines.last().map(String::as_str),
        Some(r#"run _pyhost_import("app.main")"#)
    );
}
