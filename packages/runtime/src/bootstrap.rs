//! Source text run inside the interpreter right after it boots.

/// Host-integration helpers, executed once by `load_interpreter` after the
/// package installer extension has been loaded.
///
/// `{installer}` is replaced with the installer's module name.
const BOOTSTRAP_TEMPLATE: &str = r#"
import importlib
import sys

import {installer}


def _pyhost_invalidate_caches():
    importlib.invalidate_caches()


def _pyhost_import(name):
    if name in sys.modules:
        return importlib.reload(sys.modules[name])
    return importlib.import_module(name)


def _pyhost_installer():
    return {installer}
"#;

/// The bootstrap source for an installer module named `installer`.
pub fn bootstrap_source(installer: &str) -> String {
    BOOTSTRAP_TEMPLATE.replace("{installer}", installer)
}

/// Source that refreshes the import system's view of the filesystem.
pub const INVALIDATE_CACHES: &str = "_pyhost_invalidate_caches()";

/// Source that imports (or reloads) module `name`.
pub fn import_source(name: &str) -> String {
    format!("_pyhost_import({:?})", name)
}

/// Dotted module name for a source path, e.g. `lib/pkg/mod.py` to `lib.pkg.mod`.
pub fn module_name(path: &str, extension: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix(extension).unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("/__init__").unwrap_or(trimmed);
    trimmed
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join(".")
}
