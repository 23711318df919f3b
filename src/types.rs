//! Semantic type model shared by the catalog loader and the conversion engine.
//!
//! Named types live in a `TypeTable` arena and are referenced by `NamedId`, so
//! recursive declarations (`type List struct { Next *List }`) need no
//! reference counting. Aliases never reach this layer: the loader resolves them
//! to the type they stand for.
pub mod parse;
pub mod rules;

pub use rules::TypeRules;

/// A Go package as seen from generated code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Package {
    pub name: String,
    pub path: String,
}

impl Package {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self { name: name.into(), path: path.into() }
    }

    /// Standard library package whose name is the last path element.
    pub fn std(path: &str) -> Self {
        let name = path.rsplit('/').next().unwrap_or(path);
        Self::new(name, path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basic {
    Bool,
    Int, Int8, Int16, Int32, Int64,
    Uint, Uint8, Uint16, Uint32, Uint64, Uintptr,
    Float32, Float64,
    Complex64, Complex128,
    String,
    // spelled-out aliases, kept apart only for printing
    Byte,
    Rune,
}

impl Basic {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Basic::Bool,
            "int" => Basic::Int,
            "int8" => Basic::Int8,
            "int16" => Basic::Int16,
            "int32" => Basic::Int32,
            "int64" => Basic::Int64,
            "uint" => Basic::Uint,
            "uint8" => Basic::Uint8,
            "uint16" => Basic::Uint16,
            "uint32" => Basic::Uint32,
            "uint64" => Basic::Uint64,
            "uintptr" => Basic::Uintptr,
            "float32" => Basic::Float32,
            "float64" => Basic::Float64,
            "complex64" => Basic::Complex64,
            "complex128" => Basic::Complex128,
            "string" => Basic::String,
            "byte" => Basic::Byte,
            "rune" => Basic::Rune,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Basic::Bool => "bool",
            Basic::Int => "int",
            Basic::Int8 => "int8",
            Basic::Int16 => "int16",
            Basic::Int32 => "int32",
            Basic::Int64 => "int64",
            Basic::Uint => "uint",
            Basic::Uint8 => "uint8",
            Basic::Uint16 => "uint16",
            Basic::Uint32 => "uint32",
            Basic::Uint64 => "uint64",
            Basic::Uintptr => "uintptr",
            Basic::Float32 => "float32",
            Basic::Float64 => "float64",
            Basic::Complex64 => "complex64",
            Basic::Complex128 => "complex128",
            Basic::String => "string",
            Basic::Byte => "byte",
            Basic::Rune => "rune",
        }
    }

    /// `byte` and `rune` are aliases of `uint8` and `int32`.
    pub fn canonical(self) -> Self {
        match self {
            Basic::Byte => Basic::Uint8,
            Basic::Rune => Basic::Int32,
            other => other,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self.canonical(),
            Basic::Int | Basic::Int8 | Basic::Int16 | Basic::Int32 | Basic::Int64
                | Basic::Uint | Basic::Uint8 | Basic::Uint16 | Basic::Uint32 | Basic::Uint64
                | Basic::Uintptr
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Basic::Float32 | Basic::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Basic::Complex64 | Basic::Complex128)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Basic(Basic),
    Named(NamedId),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(u64, Box<Type>),
    Map(Box<Type>, Box<Type>),
    /// Method names, sorted.
    Interface(Vec<String>),
    Struct(Vec<Field>),
}

impl Type {
    pub fn pointer_to(elem: Type) -> Self {
        Type::Pointer(Box::new(elem))
    }

    pub fn empty_interface() -> Self {
        Type::Interface(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub tag: String,
    pub embedded: bool,
}

pub fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub pointer_receiver: bool,
}

#[derive(Debug, Clone)]
pub struct NamedType {
    pub name: String,
    /// `None` for predeclared types such as `error`.
    pub package: Option<Package>,
    /// Right-hand side of the declaration. May itself be a named type.
    pub definition: Type,
    pub methods: Vec<Method>,
}

/// Maps a package to the qualifier used in front of its type names, or `None`
/// to leave them unqualified.
pub type Qualifier<'q> = &'q dyn Fn(&Package) -> Option<String>;

#[derive(Debug, Clone)]
pub struct TypeTable {
    named: Vec<NamedType>,
}

const ERROR_ID: NamedId = NamedId(0);

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let error = NamedType {
            name: "error".into(),
            package: None,
            definition: Type::Interface(vec!["Error".into()]),
            methods: Vec::new(),
        };
        Self { named: vec![error] }
    }

    pub fn error_type(&self) -> Type {
        Type::Named(ERROR_ID)
    }

    /// Reserves an id so that definitions may refer to it before it is defined.
    pub fn declare(&mut self, name: impl Into<String>, package: Option<Package>) -> NamedId {
        self.named.push(NamedType {
            name: name.into(),
            package,
            definition: Type::Struct(Vec::new()),
            methods: Vec::new(),
        });
        NamedId(self.named.len() - 1)
    }

    pub fn define(&mut self, id: NamedId, definition: Type, methods: Vec<Method>) {
        let named = &mut self.named[id.0];
        named.definition = definition;
        named.methods = methods;
    }

    pub fn named(&self, id: NamedId) -> &NamedType {
        &self.named[id.0]
    }

    pub fn named_ids(&self) -> impl Iterator<Item = NamedId> + '_ {
        (0..self.named.len()).map(NamedId)
    }

    /// Follows `type A B` chains; returns `None` when the chain loops.
    pub fn try_underlying<'a>(&'a self, mut ty: &'a Type) -> Option<&'a Type> {
        let mut steps = 0;
        while let Type::Named(id) = ty {
            if steps > self.named.len() {
                return None;
            }
            ty = &self.named[id.0].definition;
            steps += 1;
        }
        Some(ty)
    }

    /// Calls `visit` for every named type mentioned by `ty`, without descending
    /// into the definitions of those named types.
    pub fn walk_named(&self, ty: &Type, visit: &mut dyn FnMut(NamedId)) {
        match ty {
            Type::Basic(_) | Type::Interface(_) => {}
            Type::Named(id) => visit(*id),
            Type::Pointer(elem) | Type::Slice(elem) | Type::Array(_, elem) => self.walk_named(elem, visit),
            Type::Map(key, value) => {
                self.walk_named(key, visit);
                self.walk_named(value, visit);
            }
            Type::Struct(fields) => {
                for f in fields {
                    self.walk_named(&f.ty, visit);
                }
            }
        }
    }

    /// Renders `ty` as Go source text.
    pub fn type_string(&self, ty: &Type, qualifier: Qualifier<'_>) -> String {
        let mut out = String::new();
        self.write_type(&mut out, ty, qualifier);
        out
    }

    fn write_type(&self, out: &mut String, ty: &Type, qualifier: Qualifier<'_>) {
        match ty {
            Type::Basic(b) => out.push_str(b.name()),
            Type::Named(id) => {
                let named = self.named(*id);
                if let Some(prefix) = named.package.as_ref().and_then(|p| qualifier(p)) {
                    out.push_str(&prefix);
                    out.push('.');
                }
                out.push_str(&named.name);
            }
            Type::Pointer(elem) => {
                out.push('*');
                self.write_type(out, elem, qualifier);
            }
            Type::Slice(elem) => {
                out.push_str("[]");
                self.write_type(out, elem, qualifier);
            }
            Type::Array(len, elem) => {
                out.push_str(&format!("[{len}]"));
                self.write_type(out, elem, qualifier);
            }
            Type::Map(key, value) => {
                out.push_str("map[");
                self.write_type(out, key, qualifier);
                out.push(']');
                self.write_type(out, value, qualifier);
            }
            Type::Interface(methods) if methods.is_empty() => out.push_str("interface{}"),
            // only reaches messages: named interfaces print by name and the
            // catalog has no inline spelling for method sets
            Type::Interface(methods) => {
                out.push_str("interface{ ");
                out.push_str(&methods.iter().map(|m| format!("{m}()")).collect::<Vec<_>>().join("; "));
                out.push_str(" }");
            }
            Type::Struct(fields) if fields.is_empty() => out.push_str("struct{}"),
            Type::Struct(fields) => {
                out.push_str("struct{ ");
                let parts = fields.iter().map(|f| {
                    let mut part = String::new();
                    if !f.embedded {
                        part.push_str(&f.name);
                        part.push(' ');
                    }
                    self.write_type(&mut part, &f.ty, qualifier);
                    part
                });
                out.push_str(&parts.collect::<Vec<_>>().join("; "));
                out.push_str(" }");
            }
        }
    }
}
