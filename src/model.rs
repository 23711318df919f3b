//! The field model: which fields get marshaled, under which types and tags.
mod overrides;

use crate::catalog::{LoadedPackage, StructDecl};
use crate::convert::{self, ConversionPlan};
use crate::diagnostics::{Diagnostics, Position};
use crate::format::Format;
use crate::scope::FileScope;
use crate::tags::{LEGACY_KEY, StructTag, uncapitalize};
use crate::types::{Type, TypeRules, TypeTable};

#[derive(Debug, Clone)]
pub struct MarshalField {
    pub name: String,
    /// Type on the struct the methods are generated for.
    pub original: Type,
    /// Type inside the intermediate struct when encoding.
    pub encode_type: Type,
    /// Type inside the intermediate struct when decoding; always nil-checkable.
    pub decode_type: Type,
    pub tag: String,
    pub overridden: bool,
    pub pos: Position,
    tags: StructTag,
}

impl MarshalField {
    fn new(rules: &dyn TypeRules, name: &str, original: Type, tag: &str, pos: Position) -> Self {
        let mut field = Self {
            name: name.to_string(),
            encode_type: original.clone(),
            decode_type: original.clone(),
            original,
            tag: tag.to_string(),
            overridden: false,
            pos,
            tags: StructTag::parse(tag),
        };
        field.set_type(rules, field.original.clone());
        field
    }

    fn set_type(&mut self, rules: &dyn TypeRules, ty: Type) {
        self.decode_type = nil_checkable(rules, &ty);
        self.encode_type = ty;
    }

    pub fn tags(&self) -> &StructTag {
        &self.tags
    }

    /// Whether the decoded type had to be wrapped in a pointer.
    pub fn is_wrapped(&self) -> bool {
        self.decode_type != self.encode_type
    }

    /// Optional fields may be absent from the input. The `optional` marker
    /// applies to all formats; a `-` format tag only to that format.
    pub fn is_optional(&self, format: Format) -> bool {
        self.tags.optional_marker() || self.tags.suppressed(format.tag_key())
    }

    /// Moves the original value into the intermediate struct.
    pub fn encode_plan(&self, rules: &dyn TypeRules) -> ConversionPlan {
        convert::resolve(rules, &self.original, &self.encode_type)
    }

    /// Moves the decoded value back; a nil-check wrapper is read through.
    pub fn decode_plan(&self, rules: &dyn TypeRules) -> ConversionPlan {
        if self.is_wrapped() {
            convert::resolve_wrapped(rules, &self.decode_type, &self.original)
        } else {
            convert::resolve(rules, &self.decode_type, &self.original)
        }
    }

    /// Key the field is known by in the given format.
    pub fn encoded_name(&self, format: Format) -> String {
        match self.tags.head(format.tag_key()) {
            Some(name) if !name.is_empty() && name != "-" => name.to_string(),
            _ => uncapitalize(&self.name),
        }
    }
}

/// Wraps `ty` in a pointer unless absence can already be told by a nil check.
pub fn nil_checkable(rules: &dyn TypeRules, ty: &Type) -> Type {
    if rules.is_nil_checkable(ty) {
        ty.clone()
    } else {
        Type::pointer_to(ty.clone())
    }
}

#[derive(Debug, Clone)]
pub struct MarshalType<'p> {
    pub name: String,
    pub pkg: &'p LoadedPackage,
    pub fields: Vec<MarshalField>,
    /// Name of the override struct, once merged.
    pub override_name: Option<String>,
    pub scope: FileScope,
}

impl<'p> MarshalType<'p> {
    /// Builds the model from the exported, named fields of `decl`.
    pub fn build(pkg: &'p LoadedPackage, decl: &StructDecl, diags: &mut Diagnostics) -> Self {
        let mut scope = FileScope::new(pkg.package.clone());
        scope.reserve(&decl.name);
        let mut fields = Vec::with_capacity(decl.fields.len());
        for f in &decl.fields {
            if !f.is_exported() {
                continue;
            }
            if f.embedded {
                diags.warn(f.pos.clone(), format!("ignoring embedded field `{}`", f.name));
                continue;
            }
            let field = MarshalField::new(&pkg.types, &f.name, f.ty.clone(), &f.tag, f.pos.clone());
            check_tag_policy(&field, diags);
            scope.add_references(&pkg.types, &field.original);
            fields.push(field);
        }
        log::debug!("{}: {} of {} fields marshaled", decl.name, fields.len(), decl.fields.len());
        MarshalType { name: decl.name.clone(), pkg, fields, override_name: None, scope }
    }

    pub fn types(&self) -> &'p TypeTable {
        &self.pkg.types
    }

    pub fn field_by_name(&self, name: &str) -> Option<&MarshalField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Method receiver name: the type name's first letter, lower-cased.
    pub fn receiver_name(&self) -> String {
        self.name.chars().next().map(|c| c.to_lowercase().collect()).unwrap_or_else(|| "x".into())
    }

    /// Whether a decoder for any of `formats` reports missing fields.
    pub fn has_required_fields(&self, formats: &[Format]) -> bool {
        formats.iter().any(|&format| self.fields.iter().any(|f| !f.is_optional(format)))
    }

    /// Renders `ty` the way it is spelled inside the generated file.
    pub fn type_string(&self, ty: &Type) -> String {
        self.types().type_string(ty, &|p| self.scope.qualify(p))
    }
}

fn check_tag_policy(field: &MarshalField, diags: &mut Diagnostics) {
    let tags = field.tags();
    if tags.legacy_required() {
        if tags.optional_marker() {
            diags.warn(
                field.pos.clone(),
                "field is tagged both optional and gencodec:\"required\"; treating it as optional",
            );
        }
    } else if let Some(other) = tags.get(LEGACY_KEY) {
        diags.warn(field.pos.clone(), format!("unknown gencodec tag value {other:?}"));
    }
}
