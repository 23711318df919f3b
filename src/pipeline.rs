//! One generation request, from catalog directory to Go source text.
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::{self, LoadedPackage};
use crate::diagnostics::Diagnostics;
use crate::emit::{self, SourceFormatter, Verbatim};
use crate::error::Error;
use crate::format::{self, Format};
use crate::model::MarshalType;

/// A generation request, as given on the command line or in a batch manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Directory holding `types.json`.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub field_override: Option<String>,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    /// Output file; `None` or `-` means stdout.
    #[serde(default)]
    pub out: Option<PathBuf>,
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_formats() -> Vec<String> {
    vec!["json".to_string()]
}

impl Config {
    pub fn new(dir: impl Into<PathBuf>, type_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            type_name: type_name.into(),
            field_override: None,
            formats: default_formats(),
            out: None,
        }
    }

    pub fn process(&self) -> Result<Generated, Error> {
        self.process_with(&Verbatim)
    }

    pub fn process_with(&self, formatter: &dyn SourceFormatter) -> Result<Generated, Error> {
        // unknown formats fail before anything is loaded
        let formats = format::parse_formats(&self.formats)?;
        let pkg = catalog::load_package(&self.dir)?;
        let generated = generate(&pkg, &self.type_name, self.field_override.as_deref(), &formats)?;
        Ok(Generated { code: formatter.format(generated.code)?, ..generated })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub code: String,
    pub diagnostics: Diagnostics,
}

impl Generated {
    /// Writes the code to `out`, creating parent directories. `None` and `-`
    /// mean stdout.
    pub fn write_to(&self, out: Option<&Path>) -> Result<(), Error> {
        match out {
            Some(path) if path != Path::new("-") => {
                let io = |source| Error::Io { path: path.to_path_buf(), source };
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent).map_err(io)?;
                }
                std::fs::write(path, &self.code).map_err(io)?;
                log::info!("wrote {}", path.display());
                Ok(())
            }
            _ => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(self.code.as_bytes())
                    .map_err(|source| Error::Io { path: PathBuf::from("-"), source })
            }
        }
    }
}

/// Generates the methods of `type_name` in an already loaded package.
pub fn generate(
    pkg: &LoadedPackage,
    type_name: &str,
    field_override: Option<&str>,
    formats: &[Format],
) -> Result<Generated, Error> {
    let decl = pkg
        .lookup_struct(type_name)
        .map_err(|source| Error::Lookup { name: type_name.to_string(), source })?;
    let mut diagnostics = Diagnostics::default();
    let mut mtyp = MarshalType::build(pkg, &decl, &mut diagnostics);
    if let Some(name) = field_override {
        let over = pkg
            .lookup_struct(name)
            .map_err(|source| Error::OverrideLookup { name: name.to_string(), source })?;
        mtyp.load_overrides(&over, &mut diagnostics)?;
    }
    log::info!("generating {} for {}.{}", list(formats), pkg.package.name, type_name);
    let code = emit::gen_package(&mut mtyp, formats);
    Ok(Generated { code, diagnostics })
}

fn list(formats: &[Format]) -> String {
    formats.iter().map(Format::to_string).collect::<Vec<_>>().join(",")
}
