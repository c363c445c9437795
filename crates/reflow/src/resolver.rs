//! Import specifier resolution.
//!
//! Only relative specifiers are resolved to files; package specifiers are
//! classified and left alone, since intra-project ordering never needs
//! package resolution.

use std::path::{Component, Path, PathBuf};

use log::debug;

/// Classification of an import specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// `./x`, `../x`: resolvable within the project
    Relative,
    /// Bare package name (`react`, `@scope/pkg`, `node:fs`)
    Package,
}

/// Extensions tried when a relative specifier names no file directly
const RESOLUTION_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// Resolves relative import specifiers against a project root.
///
/// All returned paths are workspace-relative and lexically normalized, so
/// they can serve as stable `FileAnalysis` keys.
#[derive(Debug)]
pub struct ImportResolver {
    root: PathBuf,
}

impl ImportResolver {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn classify(specifier: &str) -> SpecifierKind {
        if Self::is_relative(specifier) {
            SpecifierKind::Relative
        } else {
            SpecifierKind::Package
        }
    }

    pub fn is_relative(specifier: &str) -> bool {
        specifier.starts_with("./") || specifier.starts_with("../") || specifier == "."
    }

    /// Resolve a relative specifier from `importer` (workspace-relative).
    ///
    /// Candidate order: the literal path, then each of `.js/.jsx/.ts/.tsx`,
    /// then `index.{js,jsx,ts,tsx}` inside the named directory. The first
    /// existing candidate wins; `None` means nothing existed.
    pub fn resolve_relative(&self, importer: &Path, specifier: &str) -> Option<PathBuf> {
        let base_dir = importer.parent().unwrap_or_else(|| Path::new(""));
        let target = normalize(&base_dir.join(specifier));

        // Literal path, when the specifier already carries an extension
        if self.is_file(&target) {
            debug!("resolved '{specifier}' -> {} (literal)", target.display());
            return Some(target);
        }

        // Appended extensions
        for ext in RESOLUTION_EXTENSIONS {
            let candidate = append_extension(&target, ext);
            if self.is_file(&candidate) {
                debug!("resolved '{specifier}' -> {}", candidate.display());
                return Some(candidate);
            }
        }

        // Directory index
        for ext in RESOLUTION_EXTENSIONS {
            let candidate = target.join(format!("index.{ext}"));
            if self.is_file(&candidate) {
                debug!("resolved '{specifier}' -> {}", candidate.display());
                return Some(candidate);
            }
        }

        None
    }

    fn is_file(&self, relative: &Path) -> bool {
        self.root.join(relative).is_file()
    }
}

/// Append an extension to the final component without replacing an existing
/// one (`./a.service` must try `a.service.ts`, not `a.ts`).
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Lexically normalize `.` and `..` components. Escapes above the root are
/// clamped rather than preserved; such imports cannot be first-party anyway.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop();
            }
            Component::Normal(name) => parts.push(name),
            Component::RootDir | Component::Prefix(_) => parts.clear(),
        }
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn classifies_specifiers() {
        assert_eq!(ImportResolver::classify("./a"), SpecifierKind::Relative);
        assert_eq!(ImportResolver::classify("../a/b"), SpecifierKind::Relative);
        assert_eq!(ImportResolver::classify("react"), SpecifierKind::Package);
        assert_eq!(
            ImportResolver::classify("@scope/pkg"),
            SpecifierKind::Package
        );
    }

    #[test]
    fn extension_candidates_in_declared_order() {
        let dir = TempDir::new().unwrap();
        // Both a .ts and a .js exist; .js wins because it is probed first.
        std::fs::write(dir.path().join("util.js"), "").unwrap();
        std::fs::write(dir.path().join("util.ts"), "").unwrap();
        let resolver = ImportResolver::new(dir.path());
        assert_eq!(
            resolver.resolve_relative(Path::new("app.js"), "./util"),
            Some(PathBuf::from("util.js"))
        );
    }

    #[test]
    fn falls_back_to_directory_index() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("widgets")).unwrap();
        std::fs::write(dir.path().join("widgets/index.tsx"), "").unwrap();
        let resolver = ImportResolver::new(dir.path());
        assert_eq!(
            resolver.resolve_relative(Path::new("app.tsx"), "./widgets"),
            Some(PathBuf::from("widgets/index.tsx"))
        );
    }

    #[test]
    fn literal_path_with_extension_wins_outright() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.service.ts"), "").unwrap();
        let resolver = ImportResolver::new(dir.path());
        assert_eq!(
            resolver.resolve_relative(Path::new("app.ts"), "./a.service.ts"),
            Some(PathBuf::from("a.service.ts"))
        );
        // Without the extension the appended-extension probe still finds it.
        assert_eq!(
            resolver.resolve_relative(Path::new("app.ts"), "./a.service"),
            Some(PathBuf::from("a.service.ts"))
        );
    }

    #[test]
    fn parent_traversal_is_normalized() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/api")).unwrap();
        std::fs::write(dir.path().join("src/shared.ts"), "").unwrap();
        let resolver = ImportResolver::new(dir.path());
        assert_eq!(
            resolver.resolve_relative(Path::new("src/api/client.ts"), "../shared"),
            Some(PathBuf::from("src/shared.ts"))
        );
    }

    #[test]
    fn missing_target_resolves_to_none() {
        let dir = TempDir::new().unwrap();
        let resolver = ImportResolver::new(dir.path());
        assert_eq!(
            resolver.resolve_relative(Path::new("app.js"), "./nowhere"),
            None
        );
    }
}
