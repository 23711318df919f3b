//! Assembles the generated methods into a complete Go file.
use std::io::Write;
use std::process::{Command, Stdio};

use crate::ast::{Decl, Expr, File, ImportSpec};
use crate::error::Error;
use crate::format::Format;
use crate::model::MarshalType;
use crate::printer;
use crate::synth;

pub const HEADER: &str = "// Code generated by gencodec. DO NOT EDIT.";

pub fn package_file(mtyp: &mut MarshalType<'_>, formats: &[Format]) -> File {
    synth::prepare_scope(mtyp, formats);
    let funcs = synth::generate(mtyp, formats);

    let imports = mtyp
        .scope
        .imports()
        .map(|i| ImportSpec { alias: i.needs_alias().then(|| i.alias.clone()), path: i.path.clone() })
        .collect();
    let mut decls = Vec::with_capacity(funcs.len() + 1);
    if let Some(over) = &mtyp.override_name {
        // keeps the override struct referenced
        decls.push(Decl::Var { name: "_".into(), value: Expr::convert(format!("*{over}"), Expr::Nil) });
    }
    decls.extend(funcs.into_iter().map(Decl::Func));

    File { header: HEADER.to_string(), package: mtyp.pkg.package.name.clone(), imports, decls }
}

pub fn gen_package(mtyp: &mut MarshalType<'_>, formats: &[Format]) -> String {
    printer::print_file(&package_file(mtyp, formats))
}

// ————————————————————————————————————————————————————————————————————————————
// FORMATTING
// ————————————————————————————————————————————————————————————————————————————

/// Last pass over the generated text before it is written out.
pub trait SourceFormatter: Sync {
    fn format(&self, source: String) -> Result<String, Error>;
}

/// Leaves the printer's output as it is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbatim;

impl SourceFormatter for Verbatim {
    fn format(&self, source: String) -> Result<String, Error> {
        Ok(source)
    }
}

/// Pipes the source through an external `gofmt`.
#[derive(Debug, Clone)]
pub struct Gofmt {
    pub program: String,
}

impl Default for Gofmt {
    fn default() -> Self {
        Self { program: "gofmt".to_string() }
    }
}

impl SourceFormatter for Gofmt {
    fn format(&self, source: String) -> Result<String, Error> {
        log::debug!("running {}", self.program);
        let mut child = Command::new(&self.program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Format(format!("can't run {}: {e}", self.program)))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| Error::Format(format!("can't write to {}: {e}", self.program)))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| Error::Format(format!("{} did not finish: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Format(format!("{} failed: {}", self.program, stderr.trim())));
        }
        String::from_utf8(output.stdout).map_err(|e| Error::Format(format!("{} wrote invalid UTF-8: {e}", self.program)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_package;
    use crate::diagnostics::Diagnostics;

    #[test]
    fn file_without_imports_or_override() {
        let pkg = parse_package(
            "p/types.json",
            r#"{ "package": "p", "types": { "X": { "struct": [ { "name": "A", "type": "any", "tag": "optional:\"true\"" } ] } } }"#,
        )
        .unwrap();
        let mut mtyp = MarshalType::build(&pkg, &pkg.lookup_struct("X").unwrap(), &mut Diagnostics::default());
        let file = package_file(&mut mtyp, &[Format::Yaml]);
        assert!(file.imports.is_empty());
        assert_eq!(file.decls.len(), 2);
        let text = printer::print_file(&file);
        assert!(text.starts_with("// Code generated by gencodec. DO NOT EDIT.\n\npackage p\n\n// MarshalYAML"), "{text}");
    }

    #[test]
    fn verbatim_keeps_the_text() {
        assert_eq!(Verbatim.format("package p\n".into()).unwrap(), "package p\n");
    }

    #[test]
    fn missing_gofmt_is_a_format_error() {
        let gofmt = Gofmt { program: "gencodec-no-such-formatter".into() };
        let err = gofmt.format("package p\n".into()).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
