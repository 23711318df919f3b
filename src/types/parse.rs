//! Parser for the type-expression mini language used in catalogs.
//!
//! The grammar is the subset of Go type syntax that can appear on a struct
//! field: `*T`, `[]T`, `[N]T`, `map[K]V`, `interface{}`, `struct{}`, `Name`
//! and `qual.Name`. Names stay unresolved here; the catalog binds them.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Name { qualifier: Option<String>, name: String },
    Pointer(Box<TypeExpr>),
    Slice(Box<TypeExpr>),
    Array(u64, Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    EmptyInterface,
    EmptyStruct,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type expression {input:?} at offset {offset}: {reason}")]
pub struct ParseError {
    pub input: String,
    pub offset: usize,
    pub reason: &'static str,
}

pub fn parse(input: &str) -> Result<TypeExpr, ParseError> {
    let mut cursor = Cursor { src: input, pos: 0 };
    let expr = cursor.ty()?;
    cursor.skip_ws();
    if cursor.pos != input.len() {
        return Err(cursor.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn error(&self, reason: &'static str) -> ParseError {
        ParseError { input: self.src.to_string(), offset: self.pos, reason }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str, reason: &'static str) -> Result<(), ParseError> {
        if self.eat(token) { Ok(()) } else { Err(self.error(reason)) }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let mut end = 0;
        for (i, c) in rest.char_indices() {
            let ok = c == '_' || c.is_alphabetic() || (i > 0 && c.is_numeric());
            if !ok {
                break;
            }
            end = i + c.len_utf8();
        }
        if end == 0 {
            return None;
        }
        self.pos += end;
        Some(&rest[..end])
    }

    fn number(&mut self) -> Option<u64> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let n = rest[..end].parse().ok()?;
        self.pos += end;
        Some(n)
    }

    fn ty(&mut self) -> Result<TypeExpr, ParseError> {
        if self.eat("*") {
            return Ok(TypeExpr::Pointer(Box::new(self.ty()?)));
        }
        if self.eat("[") {
            if self.eat("]") {
                return Ok(TypeExpr::Slice(Box::new(self.ty()?)));
            }
            let len = self.number().ok_or_else(|| self.error("expected array length"))?;
            self.expect("]", "expected `]` after array length")?;
            return Ok(TypeExpr::Array(len, Box::new(self.ty()?)));
        }
        let Some(word) = self.ident() else {
            return Err(self.error("expected a type"));
        };
        match word {
            "map" => {
                self.expect("[", "expected `[` after `map`")?;
                let key = self.ty()?;
                self.expect("]", "expected `]` after map key")?;
                let value = self.ty()?;
                Ok(TypeExpr::Map(Box::new(key), Box::new(value)))
            }
            "interface" => {
                self.expect("{", "expected `{` after `interface`")?;
                self.expect("}", "only the empty interface can be written inline")?;
                Ok(TypeExpr::EmptyInterface)
            }
            "struct" => {
                self.expect("{", "expected `{` after `struct`")?;
                self.expect("}", "only the empty struct can be written inline")?;
                Ok(TypeExpr::EmptyStruct)
            }
            _ if self.eat(".") => {
                let name = self.ident().ok_or_else(|| self.error("expected a name after `.`"))?;
                Ok(TypeExpr::Name { qualifier: Some(word.to_string()), name: name.to_string() })
            }
            _ => Ok(TypeExpr::Name { qualifier: None, name: word.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> TypeExpr {
        TypeExpr::Name { qualifier: None, name: n.into() }
    }

    #[test]
    fn parses_composites() {
        let got = parse("map[string][]*big.Int").unwrap();
        let big = TypeExpr::Name { qualifier: Some("big".into()), name: "Int".into() };
        let want = TypeExpr::Map(
            Box::new(name("string")),
            Box::new(TypeExpr::Slice(Box::new(TypeExpr::Pointer(Box::new(big))))),
        );
        assert_eq!(got, want);
    }

    #[test]
    fn parses_arrays_and_inline_empties() {
        assert_eq!(parse("[4]byte").unwrap(), TypeExpr::Array(4, Box::new(name("byte"))));
        assert_eq!(parse(" interface { } ").unwrap(), TypeExpr::EmptyInterface);
        assert_eq!(parse("struct{}").unwrap(), TypeExpr::EmptyStruct);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse("[]").unwrap_err().reason, "expected a type");
        assert_eq!(parse("int int").unwrap_err().reason, "unexpected trailing input");
        assert_eq!(parse("[x]int").unwrap_err().reason, "expected array length");
        assert!(parse("interface{ M() }").is_err());
    }
}
