//! Struct tag parsing with the conventional `key:"value" key2:"value2"`
//! semantics: keys run up to a colon, values are double-quoted Go strings, and
//! parsing stops silently at the first malformed pair. The first occurrence of
//! a key wins.
use indexmap::IndexMap;

pub const OPTIONAL_KEY: &str = "optional";
/// Legacy marker, `gencodec:"required"`.
pub const LEGACY_KEY: &str = "gencodec";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructTag {
    entries: IndexMap<String, String>,
}

impl StructTag {
    pub fn parse(raw: &str) -> Self {
        let mut entries = IndexMap::new();
        let mut rest = raw;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            let key_len = rest
                .bytes()
                .position(|b| b <= b' ' || b == b':' || b == b'"' || b == 0x7f)
                .unwrap_or(rest.len());
            let bytes = rest.as_bytes();
            if key_len == 0 || key_len + 1 >= rest.len() || bytes[key_len] != b':' || bytes[key_len + 1] != b'"' {
                break;
            }
            let key = &rest[..key_len];
            rest = &rest[key_len + 1..];

            // scan to the closing quote, skipping escapes
            let bytes = rest.as_bytes();
            let mut i = 1;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' {
                    i += 1;
                }
                i += 1;
            }
            if i >= bytes.len() {
                break;
            }
            let quoted = &rest[..=i];
            rest = &rest[i + 1..];
            let Some(value) = unquote(quoted) else {
                break;
            };
            entries.entry(key.to_string()).or_insert(value);
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `optional:"true"` or `optional:"yes"`.
    pub fn optional_marker(&self) -> bool {
        matches!(self.get(OPTIONAL_KEY), Some("true" | "yes"))
    }

    pub fn legacy_required(&self) -> bool {
        self.get(LEGACY_KEY) == Some("required")
    }

    /// The value of `key` up to its first comma.
    pub fn head(&self, key: &str) -> Option<&str> {
        self.get(key).map(|v| v.split(',').next().unwrap_or(v))
    }

    /// Whether the format tag `key` says `-`, i.e. the field is not encoded.
    pub fn suppressed(&self, key: &str) -> bool {
        self.head(key) == Some("-")
    }
}

fn unquote(quoted: &str) -> Option<String> {
    let inner = quoted.strip_prefix('"')?.strip_suffix('"')?;
    // \x and octal escapes are single bytes, so the result is built as bytes
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut out, c);
            continue;
        }
        let escaped = match chars.next()? {
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' => {
                out.push(u8::try_from(digits(&mut chars, 16, 2)?).ok()?);
                continue;
            }
            'u' => char::from_u32(digits(&mut chars, 16, 4)?)?,
            'U' => char::from_u32(digits(&mut chars, 16, 8)?)?,
            d @ '0'..='7' => {
                let rest = digits(&mut chars, 8, 2)?;
                out.push(u8::try_from(d.to_digit(8)? * 64 + rest).ok()?);
                continue;
            }
            _ => return None,
        };
        push_char(&mut out, escaped);
    }
    String::from_utf8(out).ok()
}

fn push_char(out: &mut Vec<u8>, c: char) {
    out.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes());
}

fn digits(chars: &mut std::str::Chars<'_>, radix: u32, count: usize) -> Option<u32> {
    let mut n = 0u32;
    for _ in 0..count {
        n = n * radix + chars.next()?.to_digit(radix)?;
    }
    Some(n)
}

/// Lower-cases the first character: `TheField` -> `theField`.
pub fn uncapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
