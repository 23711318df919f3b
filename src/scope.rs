//! Name bookkeeping for one generated file.
//!
//! `FileScope` knows which packages the output imports and which local type
//! names it mentions; `FuncScope` hands out identifiers that collide with
//! neither. Import aliases for packages that field types refer to are fixed
//! when the file scope is sealed, before any function scope exists, so a name
//! handed out by a function scope can never be captured by a later import.
use indexmap::{IndexMap, IndexSet};

use crate::types::{Package, Type, TypeTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub name: String,
    pub alias: String,
}

impl Import {
    /// Whether the import line must spell out its alias.
    pub fn needs_alias(&self) -> bool {
        self.alias != self.name
    }
}

#[derive(Debug, Clone)]
pub struct FileScope {
    local: Package,
    local_names: IndexSet<String>,
    pending: IndexMap<String, Package>,
    imports: IndexMap<String, Import>,
    sealed: bool,
}

impl FileScope {
    pub fn new(local: Package) -> Self {
        Self {
            local,
            local_names: IndexSet::new(),
            pending: IndexMap::new(),
            imports: IndexMap::new(),
            sealed: false,
        }
    }

    /// Records every named type `ty` mentions: local names become reserved,
    /// foreign packages become imports.
    pub fn add_references(&mut self, types: &TypeTable, ty: &Type) {
        let mut named = Vec::new();
        types.walk_named(ty, &mut |id| named.push(id));
        for id in named {
            let decl = types.named(id);
            match &decl.package {
                None => {}
                Some(pkg) if pkg.path == self.local.path => self.reserve(&decl.name),
                Some(pkg) => self.require(pkg.clone()),
            }
        }
    }

    /// Marks a local (package-level) name as taken.
    pub fn reserve(&mut self, name: &str) {
        self.local_names.insert(name.to_string());
    }

    /// Requests an import. Before sealing the alias is only decided later.
    pub fn require(&mut self, pkg: Package) {
        if self.sealed {
            self.package_alias(&pkg);
        } else if !self.imports.contains_key(&pkg.path) {
            self.pending.entry(pkg.path.clone()).or_insert(pkg);
        }
    }

    /// Drops pending imports that `keep` rejects; no effect after sealing.
    pub fn retain_pending(&mut self, mut keep: impl FnMut(&Package) -> bool) {
        self.pending.retain(|_, pkg| keep(pkg));
    }

    /// Assigns aliases to every pending import, in import path order.
    pub fn seal(&mut self) {
        if self.sealed {
            return;
        }
        let mut pending: Vec<Package> = self.pending.drain(..).map(|(_, p)| p).collect();
        pending.sort_by(|a, b| a.path.cmp(&b.path));
        for pkg in &pending {
            self.package_alias(pkg);
        }
        self.sealed = true;
    }

    /// Returns the alias for `pkg`, importing it if needed. Aliases never change
    /// once assigned.
    pub fn package_alias(&mut self, pkg: &Package) -> String {
        if let Some(import) = self.imports.get(&pkg.path) {
            return import.alias.clone();
        }
        let mut alias = pkg.name.clone();
        let mut n = 1;
        while self.is_used(&alias) {
            alias = format!("{}{n}", pkg.name);
            n += 1;
        }
        log::trace!("import {:?} as {alias}", pkg.path);
        self.imports.insert(
            pkg.path.clone(),
            Import { path: pkg.path.clone(), name: pkg.name.clone(), alias: alias.clone() },
        );
        alias
    }

    pub fn alias_of(&self, path: &str) -> Option<&str> {
        self.imports.get(path).map(|i| i.alias.as_str())
    }

    /// Prefix to write in front of type names from `pkg`.
    pub fn qualify(&self, pkg: &Package) -> Option<String> {
        if pkg.path == self.local.path {
            return None;
        }
        Some(self.alias_of(&pkg.path).unwrap_or(&pkg.name).to_string())
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.local_names.contains(name) || self.imports.values().any(|i| i.alias == name)
    }

    pub fn imports(&self) -> impl Iterator<Item = &Import> {
        self.imports.values()
    }
}

/// Identifiers of one generated function.
#[derive(Debug)]
pub struct FuncScope<'f> {
    file: &'f FileScope,
    vars: IndexSet<String>,
}

impl<'f> FuncScope<'f> {
    pub fn new(file: &'f FileScope) -> Self {
        Self { file, vars: IndexSet::new() }
    }

    pub fn file(&self) -> &'f FileScope {
        self.file
    }

    /// `preferred`, or the first of `preferred1`, `preferred2`, ... that is free.
    pub fn new_ident(&mut self, preferred: &str) -> String {
        let mut name = preferred.to_string();
        let mut n = 1;
        while self.vars.contains(&name) || self.file.is_used(&name) {
            name = format!("{preferred}{n}");
            n += 1;
        }
        self.vars.insert(name.clone());
        name
    }
}
