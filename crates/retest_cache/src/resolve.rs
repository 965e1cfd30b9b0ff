//! Resolution of top-level imports to project files.
//!
//! Only imports that land inside the project root count as dependencies;
//! everything else is treated as third-party and ignored. Resolution is one
//! level deep: the imports of a dependency are not followed.

use std::path::{Path, PathBuf};

use retest_py_parser::{PyModule, StmtKind};

use crate::error::CacheError;

/// Maps import statements of a parsed file to local source files.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    root: PathBuf,
    search_paths: Vec<PathBuf>,
}

impl ImportResolver {
    /// Creates a resolver for the project at `root`. `search_paths` are
    /// extra absolute-import roots, tried after the importing file's
    /// directory and the project root.
    pub fn new(root: impl Into<PathBuf>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            search_paths,
        }
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the local files imported at the top level of `module`, which
    /// was parsed from `file`, in discovery order without duplicates.
    pub fn local_dependencies(
        &self,
        file: &Path,
        module: &PyModule,
    ) -> Result<Vec<PathBuf>, CacheError> {
        let mut deps = Vec::new();
        for stmt in module.top_level_imports() {
            match &stmt.kind {
                StmtKind::Import(names) => {
                    for alias in names {
                        for dep in self.resolve_absolute(file, &alias.name, &[])? {
                            push_unique(&mut deps, dep, file);
                        }
                    }
                }
                StmtKind::ImportFrom {
                    level: 0,
                    module: Some(name),
                    names,
                } => {
                    let names: Vec<&str> = names.iter().map(|a| a.name.as_str()).collect();
                    for dep in self.resolve_absolute(file, name, &names)? {
                        push_unique(&mut deps, dep, file);
                    }
                }
                StmtKind::ImportFrom {
                    level,
                    module,
                    names,
                } => {
                    let names: Vec<&str> = names.iter().map(|a| a.name.as_str()).collect();
                    for dep in self.resolve_relative(file, *level, module.as_deref(), &names)? {
                        push_unique(&mut deps, dep, file);
                    }
                }
                _ => {}
            }
        }
        Ok(deps)
    }

    fn absolute_roots(&self, file: &Path) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.search_paths.len() + 2);
        if let Some(dir) = file.parent() {
            roots.push(dir.to_path_buf());
        }
        roots.push(self.root.clone());
        roots.extend(self.search_paths.iter().cloned());
        roots
    }

    /// Resolves `import name` or, with `from_names`, `from name import ..`.
    fn resolve_absolute(
        &self,
        file: &Path,
        name: &str,
        from_names: &[&str],
    ) -> Result<Vec<PathBuf>, CacheError> {
        let roots = self.absolute_roots(file);
        for root in &roots {
            if let Some(found) = find_module(root, name) {
                return Ok(if self.is_local(&found) { vec![found] } else { Vec::new() });
            }
        }

        // Directories without `__init__.py` are namespace packages. They have
        // no source of their own; only submodules named by a from-import count.
        let namespaces: Vec<PathBuf> = roots
            .iter()
            .map(|root| dotted_path(root, name))
            .filter(|dir| dir.is_dir())
            .collect();
        if !namespaces.is_empty() {
            let mut found = Vec::new();
            for dir in namespaces.iter().filter(|d| self.is_local(d)) {
                found.extend(from_names.iter().filter_map(|sub| find_module(dir, sub)));
            }
            return Ok(found);
        }

        // Not found anywhere: third-party, unless a regular local package or
        // module of that name exists and the import points at a missing part.
        let top = name.split('.').next().unwrap_or(name);
        let shadowed = roots.iter().any(|root| {
            self.is_local(root)
                && (root.join(format!("{top}.py")).is_file()
                    || root.join(top).join("__init__.py").is_file())
        });
        if shadowed {
            return Err(CacheError::DependencyResolution {
                path: file.to_path_buf(),
                module: name.to_string(),
            });
        }
        Ok(Vec::new())
    }

    fn resolve_relative(
        &self,
        file: &Path,
        level: u32,
        module: Option<&str>,
        names: &[&str],
    ) -> Result<Vec<PathBuf>, CacheError> {
        let unresolved = || CacheError::DependencyResolution {
            path: file.to_path_buf(),
            module: format!("{}{}", ".".repeat(level as usize), module.unwrap_or("")),
        };

        let mut base = file.parent().ok_or_else(unresolved)?;
        for _ in 1..level {
            base = base.parent().ok_or_else(unresolved)?;
        }

        let mut found = Vec::new();
        match module {
            Some(name) => found.push(find_module(base, name).ok_or_else(unresolved)?),
            None => {
                let package_init = base.join("__init__.py");
                for name in names {
                    match find_module(base, name) {
                        Some(path) => found.push(path),
                        None if package_init.is_file() => found.push(package_init.clone()),
                        None => {
                            return Err(CacheError::DependencyResolution {
                                path: file.to_path_buf(),
                                module: format!("{}{name}", ".".repeat(level as usize)),
                            })
                        }
                    }
                }
            }
        }
        found.retain(|p| self.is_local(p));
        Ok(found)
    }

    fn is_local(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }
}

/// Looks for `a/b.py` or `a/b/__init__.py` under `dir` for module `a.b`.
fn find_module(dir: &Path, dotted: &str) -> Option<PathBuf> {
    if dotted == "*" {
        return None;
    }
    let base = dotted_path(dir, dotted);
    let as_file = base.with_extension("py");
    if as_file.is_file() {
        return Some(as_file);
    }
    let as_package = base.join("__init__.py");
    as_package.is_file().then_some(as_package)
}

fn dotted_path(dir: &Path, dotted: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    path.extend(dotted.split('.'));
    path
}

fn push_unique(deps: &mut Vec<PathBuf>, dep: PathBuf, importer: &Path) {
    if dep != importer && !deps.contains(&dep) {
        deps.push(dep);
    }
}
