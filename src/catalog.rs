//! Loads the `types.json` catalog that describes one Go package.
//!
//! Loading has two stages: serde turns the file into
//! plain shape structs, then a resolver binds every type expression against the
//! package scope, the import tables and the universe scope, producing a
//! `TypeTable` in which aliases are already gone.
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::diagnostics::Position;
use crate::path_de::{JsonPathError, from_str_with_path};
use crate::types::parse::{self, ParseError, TypeExpr};
use crate::types::{Basic, Field, Method, NamedId, Package, Type, TypeRules, TypeTable};

pub const CATALOG_FILE: &str = "types.json";

static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{Nd}_]*$").expect("identifier pattern compiles"));

// ————————————————————————————————————————————————————————————————————————————
// On-disk shape
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    pub package: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub imports: IndexMap<String, ImportSpec>,
    #[serde(default)]
    pub types: IndexMap<String, TypeSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportSpec {
    pub path: String,
    /// Package name when it differs from the last path element.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub types: IndexMap<String, TypeSpec>,
}

#[derive(Debug, Deserialize)]
pub struct TypeSpec {
    #[serde(flatten)]
    pub def: TypeDef,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDef {
    Underlying(String),
    Struct(Vec<FieldSpec>),
    Interface(Vec<String>),
    Alias(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub embedded: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodSpec {
    pub name: String,
    #[serde(default)]
    pub pointer: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// Errors
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("can't read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("{file}: {source}")]
    Json { file: String, source: JsonPathError },

    #[error("{file}: {context}: {source}")]
    TypeExpr { file: String, context: String, source: ParseError },

    #[error("{file}: {context}: undefined type {name}")]
    Undefined { file: String, context: String, name: String },

    #[error("{file}: {context}: unknown package qualifier {qualifier}")]
    UnknownQualifier { file: String, context: String, qualifier: String },

    #[error("{file}: invalid recursive type {name}")]
    Cycle { file: String, name: String },

    #[error("{file}: {context}: invalid identifier {ident:?}")]
    InvalidIdent { file: String, context: String, ident: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("type {0} not found")]
    NotFound(String),
    #[error("{0} is not a struct type")]
    NotStruct(String),
    #[error("{0} is declared in package {1}")]
    Foreign(String, String),
}

// ————————————————————————————————————————————————————————————————————————————
// Loaded package
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub tag: String,
    pub embedded: bool,
    pub pos: Position,
}

impl StructField {
    pub fn is_exported(&self) -> bool {
        crate::types::is_exported(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: String,
    pub id: NamedId,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone)]
pub struct LoadedPackage {
    /// Where the catalog came from, used in positions.
    pub source: String,
    pub package: Package,
    pub types: TypeTable,
    scope: IndexMap<String, Type>,
}

impl LoadedPackage {
    /// Resolves a package-level name, following aliases.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.scope.get(name)
    }

    pub fn lookup_struct(&self, name: &str) -> Result<StructDecl, LookupError> {
        let ty = self.lookup(name).ok_or_else(|| LookupError::NotFound(name.to_string()))?;
        let Type::Named(id) = ty else {
            return Err(LookupError::NotStruct(name.to_string()));
        };
        let named = self.types.named(*id);
        if let Some(pkg) = &named.package
            && pkg.path != self.package.path
        {
            return Err(LookupError::Foreign(name.to_string(), pkg.path.clone()));
        }
        let Type::Struct(fields) = self.types.underlying(ty) else {
            return Err(LookupError::NotStruct(name.to_string()));
        };
        let fields = fields
            .iter()
            .map(|f: &Field| StructField {
                name: f.name.clone(),
                ty: f.ty.clone(),
                tag: f.tag.clone(),
                embedded: f.embedded,
                pos: Position::field(&self.source, &named.name, &f.name),
            })
            .collect();
        Ok(StructDecl { name: named.name.clone(), id: *id, fields })
    }
}

pub fn load_package(dir: &Path) -> Result<LoadedPackage, CatalogError> {
    let path = dir.join(CATALOG_FILE);
    log::debug!("loading catalog {}", path.display());
    let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Read { path: path.clone(), source })?;
    parse_package(&path.display().to_string(), &text)
}

pub fn parse_package(source: &str, text: &str) -> Result<LoadedPackage, CatalogError> {
    let file: CatalogFile =
        from_str_with_path(text).map_err(|source_err| CatalogError::Json { file: source.to_string(), source: source_err })?;
    Resolver::new(source, &file)?.finish(&file)
}

// ————————————————————————————————————————————————————————————————————————————
// Resolver
// ————————————————————————————————————————————————————————————————————————————

/// `None` is the local package, `Some(q)` the import bound to qualifier `q`.
type ScopeKey = Option<String>;

#[derive(Debug)]
enum Binding {
    Named(NamedId),
    Alias { expr: String, resolved: Option<Type> },
}

struct Resolver {
    file: String,
    local: Package,
    table: TypeTable,
    scopes: IndexMap<ScopeKey, IndexMap<String, Binding>>,
    in_progress: Vec<(ScopeKey, String)>,
}

impl Resolver {
    fn new(source: &str, file: &CatalogFile) -> Result<Self, CatalogError> {
        let local = Package::new(&file.package, file.path.clone().unwrap_or_else(|| file.package.clone()));
        let mut this = Resolver {
            file: source.to_string(),
            local: local.clone(),
            table: TypeTable::new(),
            scopes: IndexMap::new(),
            in_progress: Vec::new(),
        };
        this.check_ident("package clause", &file.package)?;
        this.declare(None, &local, &file.types)?;
        for (qualifier, import) in &file.imports {
            this.check_ident("imports", qualifier)?;
            let name = match &import.name {
                Some(name) => name.clone(),
                None => Package::std(&import.path).name,
            };
            this.check_ident(&format!("import {qualifier}"), &name)?;
            let pkg = Package::new(name, &import.path);
            this.declare(Some(qualifier.clone()), &pkg, &import.types)?;
        }
        Ok(this)
    }

    fn check_ident(&self, context: &str, ident: &str) -> Result<(), CatalogError> {
        if IDENT.is_match(ident) {
            Ok(())
        } else {
            Err(CatalogError::InvalidIdent { file: self.file.clone(), context: context.to_string(), ident: ident.to_string() })
        }
    }

    fn declare(
        &mut self,
        key: ScopeKey,
        pkg: &Package,
        specs: &IndexMap<String, TypeSpec>,
    ) -> Result<(), CatalogError> {
        let mut bindings = IndexMap::new();
        for (name, spec) in specs {
            self.check_ident(&format!("type {name}"), name)?;
            let binding = match &spec.def {
                TypeDef::Alias(expr) => Binding::Alias { expr: expr.clone(), resolved: None },
                _ => Binding::Named(self.table.declare(name, Some(pkg.clone()))),
            };
            bindings.insert(name.clone(), binding);
        }
        self.scopes.insert(key, bindings);
        Ok(())
    }

    fn finish(mut self, file: &CatalogFile) -> Result<LoadedPackage, CatalogError> {
        self.define_all(None, &file.types)?;
        for (qualifier, import) in &file.imports {
            self.define_all(Some(qualifier.clone()), &import.types)?;
        }
        for id in self.table.named_ids() {
            if self.table.try_underlying(&Type::Named(id)).is_none() {
                let name = self.table.named(id).name.clone();
                return Err(CatalogError::Cycle { file: self.file, name });
            }
        }
        let mut scope = IndexMap::new();
        for name in file.types.keys() {
            let ty = self.lookup(&None, name, &format!("type {name}"))?;
            scope.insert(name.clone(), ty);
        }
        log::debug!("catalog {}: {} types in package {}", self.file, scope.len(), self.local.path);
        Ok(LoadedPackage { source: self.file, package: self.local, types: self.table, scope })
    }

    fn define_all(&mut self, key: ScopeKey, specs: &IndexMap<String, TypeSpec>) -> Result<(), CatalogError> {
        for (name, spec) in specs {
            let context = format!("type {name}");
            let Some(Binding::Named(id)) = self.scopes.get(&key).and_then(|s| s.get(name)) else {
                // aliases are resolved on demand
                continue;
            };
            let id = *id;
            let definition = match &spec.def {
                TypeDef::Underlying(expr) => self.resolve_str(&key, expr, &context)?,
                TypeDef::Struct(fields) => {
                    let mut out = Vec::with_capacity(fields.len());
                    for f in fields {
                        let context = format!("field {name}.{}", f.name);
                        self.check_ident(&context, &f.name)?;
                        out.push(Field {
                            name: f.name.clone(),
                            ty: self.resolve_str(&key, &f.ty, &context)?,
                            tag: f.tag.clone(),
                            embedded: f.embedded,
                        });
                    }
                    Type::Struct(out)
                }
                TypeDef::Interface(methods) => {
                    for m in methods {
                        self.check_ident(&context, m)?;
                    }
                    let mut methods = methods.clone();
                    methods.sort();
                    methods.dedup();
                    Type::Interface(methods)
                }
                TypeDef::Alias(_) => continue,
            };
            let mut methods = Vec::with_capacity(spec.methods.len());
            for m in &spec.methods {
                self.check_ident(&context, &m.name)?;
                methods.push(Method { name: m.name.clone(), pointer_receiver: m.pointer });
            }
            self.table.define(id, definition, methods);
        }
        Ok(())
    }

    fn resolve_str(&mut self, key: &ScopeKey, src: &str, context: &str) -> Result<Type, CatalogError> {
        let expr = parse::parse(src).map_err(|source| CatalogError::TypeExpr {
            file: self.file.clone(),
            context: context.to_string(),
            source,
        })?;
        self.resolve(key, &expr, context)
    }

    fn resolve(&mut self, key: &ScopeKey, expr: &TypeExpr, context: &str) -> Result<Type, CatalogError> {
        Ok(match expr {
            TypeExpr::Pointer(elem) => Type::Pointer(Box::new(self.resolve(key, elem, context)?)),
            TypeExpr::Slice(elem) => Type::Slice(Box::new(self.resolve(key, elem, context)?)),
            TypeExpr::Array(len, elem) => Type::Array(*len, Box::new(self.resolve(key, elem, context)?)),
            TypeExpr::Map(k, v) => Type::Map(
                Box::new(self.resolve(key, k, context)?),
                Box::new(self.resolve(key, v, context)?),
            ),
            TypeExpr::EmptyInterface => Type::empty_interface(),
            TypeExpr::EmptyStruct => Type::Struct(Vec::new()),
            TypeExpr::Name { qualifier: Some(q), name } => {
                let scope = Some(q.clone());
                if !self.scopes.contains_key(&scope) {
                    return Err(CatalogError::UnknownQualifier {
                        file: self.file.clone(),
                        context: context.to_string(),
                        qualifier: q.clone(),
                    });
                }
                self.lookup(&scope, name, context)?
            }
            TypeExpr::Name { qualifier: None, name } => self.lookup(key, name, context)?,
        })
    }

    fn lookup(&mut self, key: &ScopeKey, name: &str, context: &str) -> Result<Type, CatalogError> {
        let alias = match self.scopes.get(key).and_then(|s| s.get(name)) {
            Some(Binding::Named(id)) => return Ok(Type::Named(*id)),
            Some(Binding::Alias { resolved: Some(ty), .. }) => return Ok(ty.clone()),
            Some(Binding::Alias { expr, resolved: None }) => expr.clone(),
            None => return self.universe(name, context),
        };
        let marker = (key.clone(), name.to_string());
        if self.in_progress.contains(&marker) {
            return Err(CatalogError::Cycle { file: self.file.clone(), name: name.to_string() });
        }
        self.in_progress.push(marker);
        let resolved = self.resolve_str(key, &alias, &format!("alias {name}"));
        self.in_progress.pop();
        let resolved = resolved?;
        if let Some(Binding::Alias { resolved: slot, .. }) = self.scopes.get_mut(key).and_then(|s| s.get_mut(name)) {
            *slot = Some(resolved.clone());
        }
        Ok(resolved)
    }

    fn universe(&self, name: &str, context: &str) -> Result<Type, CatalogError> {
        if let Some(basic) = Basic::from_name(name) {
            return Ok(Type::Basic(basic));
        }
        match name {
            "error" => Ok(self.table.error_type()),
            "any" => Ok(Type::empty_interface()),
            _ => Err(CatalogError::Undefined {
                file: self.file.clone(),
                context: context.to_string(),
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "package": "demo",
        "path": "example.com/demo",
        "imports": {
            "big": { "path": "math/big", "types": { "Int": { "struct": [] } } },
            "other": { "path": "example.com/other-pkg", "name": "other", "types": {
                "Int": { "underlying": "big.Int" }
            } }
        },
        "types": {
            "Aliased": { "alias": "big.Int" },
            "Twice": { "alias": "Aliased" },
            "Iface": { "interface": ["Method"] },
            "Impl": { "struct": [], "methods": [{ "name": "Method", "pointer": true }] },
            "ints": { "underlying": "[]int" },
            "X": { "struct": [
                { "name": "A", "type": "Twice" },
                { "name": "B", "type": "map[string]*other.Int", "tag": "json:\"b\"" },
                { "name": "c", "type": "any" },
                { "name": "Impl", "type": "Impl", "embedded": true }
            ] }
        }
    }"#;

    fn sample() -> LoadedPackage {
        parse_package("demo/types.json", SAMPLE).unwrap()
    }

    fn render(pkg: &LoadedPackage, ty: &Type) -> String {
        let local = pkg.package.path.clone();
        pkg.types.type_string(ty, &|p: &Package| (p.path != local).then(|| p.name.clone()))
    }

    #[test]
    fn resolves_fields_through_alias_chains() {
        let pkg = sample();
        let x = pkg.lookup_struct("X").unwrap();
        let rendered: Vec<_> = x.fields.iter().map(|f| (f.name.as_str(), render(&pkg, &f.ty))).collect();
        assert_eq!(
            rendered,
            vec![("A", "big.Int".into()), ("B", "map[string]*other.Int".into()), ("c", "interface{}".into()), ("Impl", "Impl".into())]
        );
        assert!(x.fields[3].embedded);
        assert_eq!(x.fields[1].tag, "json:\"b\"");
        assert_eq!(x.fields[1].pos.to_string(), "demo/types.json:X.B");
    }

    #[test]
    fn imported_definitions_chain_to_their_underlying_type() {
        let pkg = sample();
        let x = pkg.lookup_struct("X").unwrap();
        let Type::Map(_, value) = &x.fields[1].ty else { panic!("expected a map") };
        let Type::Pointer(other_int) = value.as_ref() else { panic!("expected a pointer") };
        assert_eq!(pkg.types.underlying(other_int), &Type::Struct(Vec::new()));
    }

    #[test]
    fn lookup_errors() {
        let pkg = sample();
        assert_eq!(pkg.lookup_struct("Nope").unwrap_err(), LookupError::NotFound("Nope".into()));
        assert_eq!(pkg.lookup_struct("ints").unwrap_err(), LookupError::NotStruct("ints".into()));
        assert!(matches!(pkg.lookup_struct("Aliased").unwrap_err(), LookupError::Foreign(..)));
        assert!(pkg.lookup_struct("Impl").unwrap().fields.is_empty());
    }

    #[test]
    fn alias_cycles_are_rejected() {
        let src = r#"{ "package": "p", "types": { "A": { "alias": "B" }, "B": { "alias": "[]A" } } }"#;
        let err = parse_package("p/types.json", src).unwrap_err();
        assert!(matches!(err, CatalogError::Cycle { .. }), "{err}");
    }

    #[test]
    fn definition_cycles_are_rejected() {
        let src = r#"{ "package": "p", "types": { "A": { "underlying": "B" }, "B": { "underlying": "A" } } }"#;
        let err = parse_package("p/types.json", src).unwrap_err();
        assert_eq!(err.to_string(), "p/types.json: invalid recursive type A");
    }

    #[test]
    fn recursive_pointers_are_fine() {
        let src = r#"{ "package": "p", "types": { "List": { "struct": [
            { "name": "Next", "type": "*List" }
        ] } } }"#;
        let pkg = parse_package("p/types.json", src).unwrap();
        assert_eq!(pkg.lookup_struct("List").unwrap().fields.len(), 1);
    }

    #[test]
    fn undefined_names_and_qualifiers() {
        let src = r#"{ "package": "p", "types": { "X": { "struct": [ { "name": "F", "type": "[]Missing" } ] } } }"#;
        let err = parse_package("p/types.json", src).unwrap_err();
        assert_eq!(err.to_string(), "p/types.json: field X.F: undefined type Missing");

        let src = r#"{ "package": "p", "types": { "X": { "struct": [ { "name": "F", "type": "q.T" } ] } } }"#;
        let err = parse_package("p/types.json", src).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownQualifier { .. }));
    }

    #[test]
    fn json_errors_carry_the_path() {
        let src = r#"{ "package": "p", "types": { "X": { "struct": [ { "name": "F" } ] } } }"#;
        let err = parse_package("p/types.json", src).unwrap_err();
        let CatalogError::Json { source, .. } = err else { panic!("expected a JSON error") };
        assert!(source.path.starts_with("types.X"), "{}", source.path);
    }

    #[test]
    fn identifiers_are_validated() {
        let src = r#"{ "package": "my-pkg" }"#;
        let err = parse_package("p/types.json", src).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidIdent { .. }));
    }
}
