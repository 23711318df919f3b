//! Generates JSON and YAML marshaling methods for Go struct types, with
//! per-field type overrides.
//!
//! Input is a type catalog (`types.json`) describing one Go package; output is
//! a Go source file with `MarshalJSON`/`UnmarshalJSON` and
//! `MarshalYAML`/`UnmarshalYAML` methods for the requested struct.
pub mod ast;
pub mod batch;
pub mod catalog;
pub mod convert;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod format;
pub mod model;
pub mod path_de;
pub mod pipeline;
pub mod printer;
pub mod scope;
pub mod synth;
pub mod tags;
pub mod types;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use emit::{Gofmt, SourceFormatter, Verbatim};
pub use error::Error;
pub use format::Format;
pub use pipeline::{Config, Generated, generate};
