//! Renders the syntax tree as gofmt-style Go source: tab indentation,
//! aligned struct fields, one blank line between top-level declarations.
use crate::ast::{Decl, Expr, FieldDecl, File, FuncDecl, ImportSpec, Param, Stmt, StructDecl};

pub fn print_file(file: &File) -> String {
    let mut out = String::new();
    out.push_str(&file.header);
    out.push_str("\n\n");
    out.push_str(&format!("package {}\n", file.package));
    if !file.imports.is_empty() {
        out.push('\n');
        print_imports(&mut out, &file.imports);
    }
    for decl in &file.decls {
        out.push('\n');
        match decl {
            Decl::Var { name, value } => out.push_str(&format!("var {name} = {}\n", expr(value))),
            Decl::Func(func) => print_func(&mut out, func),
        }
    }
    out
}

/// Standard library paths (no dot in the first element) come first.
fn is_std(path: &str) -> bool {
    !path.split('/').next().unwrap_or(path).contains('.')
}

fn print_imports(out: &mut String, imports: &[ImportSpec]) {
    let mut std: Vec<&ImportSpec> = imports.iter().filter(|i| is_std(&i.path)).collect();
    let mut other: Vec<&ImportSpec> = imports.iter().filter(|i| !is_std(&i.path)).collect();
    std.sort_by(|a, b| a.path.cmp(&b.path));
    other.sort_by(|a, b| a.path.cmp(&b.path));

    out.push_str("import (\n");
    let groups = [std, other];
    let mut first = true;
    for group in groups.iter().filter(|g| !g.is_empty()) {
        if !first {
            out.push('\n');
        }
        first = false;
        for import in group {
            out.push('\t');
            if let Some(alias) = &import.alias {
                out.push_str(alias);
                out.push(' ');
            }
            out.push_str(&quote(&import.path));
            out.push('\n');
        }
    }
    out.push_str(")\n");
}

pub fn print_func(out: &mut String, func: &FuncDecl) {
    if !func.doc.is_empty() {
        out.push_str(&format!("// {}\n", func.doc));
    }
    let results = match func.results.as_slice() {
        [] => String::new(),
        [one] => format!(" {one}"),
        many => format!(" ({})", many.join(", ")),
    };
    out.push_str(&format!(
        "func ({}) {}({}){results} {{\n",
        param(&func.receiver),
        func.name,
        func.params.iter().map(param).collect::<Vec<_>>().join(", "),
    ));
    print_block(out, &func.body, 1);
    out.push_str("}\n");
}

fn param(p: &Param) -> String {
    format!("{} {}", p.name, p.ty)
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push('\t');
    }
}

fn print_block(out: &mut String, stmts: &[Stmt], depth: usize) {
    for stmt in stmts {
        print_stmt(out, stmt, depth);
    }
}

fn print_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    indent(out, depth);
    match stmt {
        Stmt::Type(decl) => print_struct(out, decl, depth),
        Stmt::If { init, cond, body } => {
            out.push_str("if ");
            if let Some(init) = init {
                out.push_str(&simple_stmt(init));
                out.push_str("; ");
            }
            out.push_str(&expr(cond));
            out.push_str(" {\n");
            print_block(out, body, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
        Stmt::Range { key, value, over, body } => {
            out.push_str(&format!("for {key}, {value} := range {} {{\n", expr(over)));
            print_block(out, body, depth + 1);
            indent(out, depth);
            out.push_str("}\n");
        }
        simple => {
            out.push_str(&simple_stmt(simple));
            out.push('\n');
        }
    }
}

// Statements that fit on one line, also usable as an `if` initializer.
fn simple_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Var { name, ty } => format!("var {name} {ty}"),
        Stmt::Assign { lhs, rhs } => format!("{} = {}", expr(lhs), expr(rhs)),
        Stmt::Define { names, value } => format!("{} := {}", names.join(", "), expr(value)),
        Stmt::Return(values) if values.is_empty() => "return".to_string(),
        Stmt::Return(values) => {
            format!("return {}", values.iter().map(expr).collect::<Vec<_>>().join(", "))
        }
        Stmt::Type(_) | Stmt::If { .. } | Stmt::Range { .. } => {
            unreachable!("compound statement {stmt:?} printed as a simple statement")
        }
    }
}

fn print_struct(out: &mut String, decl: &StructDecl, depth: usize) {
    if decl.fields.is_empty() {
        out.push_str(&format!("type {} struct{{}}\n", decl.name));
        return;
    }
    out.push_str(&format!("type {} struct {{\n", decl.name));
    for line in struct_lines(&decl.fields) {
        indent(out, depth + 1);
        out.push_str(&line);
        out.push('\n');
    }
    indent(out, depth);
    out.push_str("}\n");
}

fn width(s: &str) -> usize {
    s.chars().count()
}

/// Lays out field rows the way tabwriter would: the name column is aligned
/// over the whole list, the type column over each run of tagged fields.
fn struct_lines(fields: &[FieldDecl]) -> Vec<String> {
    let name_width = fields.iter().map(|f| width(&f.name)).max().unwrap_or(0);
    let mut type_widths = vec![0; fields.len()];
    let mut start = 0;
    while start < fields.len() {
        if fields[start].tag.is_empty() {
            start += 1;
            continue;
        }
        let end = (start..fields.len()).find(|&i| fields[i].tag.is_empty()).unwrap_or(fields.len());
        let w = fields[start..end].iter().map(|f| width(&f.ty)).max().unwrap_or(0);
        type_widths[start..end].fill(w);
        start = end;
    }
    fields
        .iter()
        .zip(type_widths)
        .map(|(f, type_width)| {
            let mut line = format!("{}{}{}", f.name, " ".repeat(name_width - width(&f.name) + 1), f.ty);
            if !f.tag.is_empty() {
                line.push_str(&" ".repeat(type_width - width(&f.ty) + 1));
                line.push_str(&tag_literal(&f.tag));
            }
            line
        })
        .collect()
}

fn tag_literal(tag: &str) -> String {
    if tag.contains('`') { quote(tag) } else { format!("`{tag}`") }
}

/// Go interpreted string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\x7f' => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// Operands of selectors, indexing, calls and assertions need parentheses
// around unary and binary expressions.
fn operand(e: &Expr) -> String {
    match e {
        Expr::Deref(_) | Expr::AddressOf(_) | Expr::Equal(..) | Expr::NotEqual(..) => format!("({})", expr(e)),
        _ => expr(e),
    }
}

pub fn expr(e: &Expr) -> String {
    match e {
        Expr::Name(name) => name.clone(),
        Expr::Nil => "nil".to_string(),
        Expr::Str(s) => quote(s),
        Expr::Field(base, name) => format!("{}.{name}", operand(base)),
        Expr::Deref(inner) => format!("*{}", expr(inner)),
        Expr::AddressOf(inner) => format!("&{}", expr(inner)),
        Expr::Index(base, key) => format!("{}[{}]", operand(base), expr(key)),
        Expr::Call(func, args) => {
            format!("{}({})", operand(func), args.iter().map(expr).collect::<Vec<_>>().join(", "))
        }
        Expr::Convert(ty, value) if ty.starts_with('*') || ty.starts_with("func") => {
            format!("({ty})({})", expr(value))
        }
        Expr::Convert(ty, value) => format!("{ty}({})", expr(value)),
        Expr::Assert(value, ty) => format!("{}.({ty})", operand(value)),
        Expr::Type(ty) => ty.clone(),
        Expr::Equal(a, b) => format!("{} == {}", expr(a), expr(b)),
        Expr::NotEqual(a, b) => format!("{} != {}", expr(a), expr(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: &str, tag: &str) -> FieldDecl {
        FieldDecl { name: name.into(), ty: ty.into(), tag: tag.into() }
    }

    #[test]
    fn aligns_struct_columns() {
        let lines = struct_lines(&[
            field("A", "int", r#"json:"a""#),
            field("Long", "map[string]int", r#"json:"long""#),
            field("Plain", "bool", ""),
            field("B", "*int", r#"json:"b""#),
        ]);
        assert_eq!(
            lines,
            vec![
                "A     int            `json:\"a\"`",
                "Long  map[string]int `json:\"long\"`",
                "Plain bool",
                "B     *int `json:\"b\"`",
            ]
        );
    }

    #[test]
    fn quotes_like_go() {
        assert_eq!(quote("missing 'x'"), r#""missing 'x'""#);
        assert_eq!(quote("a\"b\\c\n\x01é"), r#""a\"b\\c\n\x01é""#);
        assert_eq!(tag_literal("json:`x`"), r#""json:`x`""#);
    }

    #[test]
    fn conversions_parenthesize_pointer_types() {
        let x = Expr::name("x").field("F");
        assert_eq!(expr(&Expr::convert("myInt".into(), x.clone())), "myInt(x.F)");
        assert_eq!(expr(&Expr::convert("*big.Int".into(), x.clone())), "(*big.Int)(x.F)");
        assert_eq!(expr(&x.clone().deref()), "*x.F");
        assert_eq!(expr(&Expr::name("p").deref().field("F")), "(*p).F");
        assert_eq!(expr(&Expr::Assert(Box::new(x), "*Impl".into())), "x.F.(*Impl)");
    }

    #[test]
    fn prints_a_function() {
        let func = FuncDecl {
            doc: "Check checks.".into(),
            receiver: Param { name: "x".into(), ty: "*X".into() },
            name: "Check".into(),
            params: vec![Param { name: "input".into(), ty: "[]byte".into() }],
            results: vec!["error".into()],
            body: vec![
                Stmt::Type(StructDecl { name: "Empty".into(), fields: Vec::new() }),
                Stmt::If {
                    init: Some(Box::new(Stmt::Define { names: vec!["err".into()], value: Expr::name("f").call(vec![]) })),
                    cond: Expr::name("err").not_nil(),
                    body: vec![Stmt::Return(vec![Expr::name("err")])],
                },
                Stmt::Range {
                    key: "k".into(),
                    value: "v".into(),
                    over: Expr::name("input"),
                    body: vec![Stmt::assign(Expr::name("out").index(Expr::name("k")), Expr::name("v"))],
                },
                Stmt::Return(vec![Expr::Nil]),
            ],
        };
        let mut out = String::new();
        print_func(&mut out, &func);
        let want = "// Check checks.
func (x *X) Check(input []byte) error {
\ttype Empty struct{}
\tif err := f(); err != nil {
\t\treturn err
\t}
\tfor k, v := range input {
\t\tout[k] = v
\t}
\treturn nil
}
";
        assert_eq!(out, want);
    }

    #[test]
    fn groups_imports_std_first() {
        let file = File {
            header: "// header".into(),
            package: "p".into(),
            imports: vec![
                ImportSpec { alias: None, path: "example.com/z".into() },
                ImportSpec { alias: Some("json1".into()), path: "encoding/json".into() },
                ImportSpec { alias: None, path: "errors".into() },
            ],
            decls: vec![Decl::Var { name: "_".into(), value: Expr::convert("*Xo".into(), Expr::Nil) }],
        };
        let want = "// header

package p

import (
\tjson1 \"encoding/json\"
\t\"errors\"

\t\"example.com/z\"
)

var _ = (*Xo)(nil)
";
        assert_eq!(print_file(&file), want);
    }
}
