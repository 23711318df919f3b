// Strongly-typed Go syntax tree for the emitted file. Types are already
// rendered to text by the time they get here.

pub type TypeText = String;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Nil,
    Str(String),                      // Go string literal
    Field(Box<Expr>, String),         // x.F
    Deref(Box<Expr>),                 // *x
    AddressOf(Box<Expr>),             // &x
    Index(Box<Expr>, Box<Expr>),      // x[k]
    Call(Box<Expr>, Vec<Expr>),
    Convert(TypeText, Box<Expr>),     // T(x), or (T)(x) for pointer types
    Assert(Box<Expr>, TypeText),      // x.(T)
    Type(TypeText),                   // type used as a value, e.g. make's first argument
    Equal(Box<Expr>, Box<Expr>),
    NotEqual(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn name(name: impl Into<String>) -> Self {
        Expr::Name(name.into())
    }

    pub fn field(&self, name: &str) -> Self {
        Expr::Field(Box::new(self.clone()), name.to_string())
    }

    pub fn deref(self) -> Self {
        Expr::Deref(Box::new(self))
    }

    pub fn address_of(self) -> Self {
        Expr::AddressOf(Box::new(self))
    }

    pub fn index(self, key: Expr) -> Self {
        Expr::Index(Box::new(self), Box::new(key))
    }

    pub fn call(self, args: Vec<Expr>) -> Self {
        Expr::Call(Box::new(self), args)
    }

    pub fn convert(ty: TypeText, value: Expr) -> Self {
        Expr::Convert(ty, Box::new(value))
    }

    pub fn is_nil(self) -> Self {
        Expr::Equal(Box::new(self), Box::new(Expr::Nil))
    }

    pub fn not_nil(self) -> Self {
        Expr::NotEqual(Box::new(self), Box::new(Expr::Nil))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Type(StructDecl),                 // function-local type declaration
    Var { name: String, ty: TypeText },
    Assign { lhs: Expr, rhs: Expr },
    Define { names: Vec<String>, value: Expr },
    If { init: Option<Box<Stmt>>, cond: Expr, body: Vec<Stmt> },
    Range { key: String, value: String, over: Expr, body: Vec<Stmt> },
    Return(Vec<Expr>),
}

impl Stmt {
    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        Stmt::Assign { lhs, rhs }
    }

    pub fn when(cond: Expr, body: Vec<Stmt>) -> Self {
        Stmt::If { init: None, cond, body }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeText,
    pub tag: String,                  // raw, unquoted; empty means none
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeText,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub doc: String,
    pub receiver: Param,
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<TypeText>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Var { name: String, value: Expr },
    Func(FuncDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    pub alias: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub header: String,
    pub package: String,
    pub imports: Vec<ImportSpec>,
    pub decls: Vec<Decl>,
}
