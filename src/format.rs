use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Serialization formats methods can be generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    pub const ALL: [Format; 2] = [Format::Json, Format::Yaml];

    /// Struct tag key that names and suppresses fields for this format.
    pub fn tag_key(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    /// Suffix of the intermediate struct name (`XJSON`).
    pub fn upper(self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Yaml => "YAML",
        }
    }

    /// Package the generated methods call into, if any.
    pub fn import_path(self) -> Option<&'static str> {
        match self {
            Format::Json => Some("encoding/json"),
            // YAML methods receive their codec as an argument
            Format::Yaml => None,
        }
    }

    pub fn encode_method(self) -> String {
        format!("Marshal{}", self.upper())
    }

    pub fn decode_method(self) -> String {
        format!("Unmarshal{}", self.upper())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_key())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::ALL
            .into_iter()
            .find(|f| f.tag_key() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownFormat(s.to_string()))
    }
}

/// Parses a requested format list, dropping repeats but keeping order.
pub fn parse_formats<S: AsRef<str>>(names: &[S]) -> Result<Vec<Format>, Error> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let format: Format = name.as_ref().parse()?;
        if !out.contains(&format) {
            out.push(format);
        }
    }
    Ok(out)
}
