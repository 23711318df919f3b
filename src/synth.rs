//! Synthesis of the encode/decode method pair for each format.
//!
//! Every method declares a function-local intermediate struct, moves values
//! between it and the receiver with the planned conversions, and hands the
//! intermediate value to the codec. Decoding works on a copy of the receiver
//! that is only written back once every field has been checked and converted.
use std::collections::HashSet;

use crate::ast::{Expr, FieldDecl, FuncDecl, Param, Stmt, StructDecl};
use crate::convert::{ConversionPlan, ConversionStep, PointerAdjust, Sequence, SequenceKind};
use crate::format::Format;
use crate::model::{MarshalField, MarshalType};
use crate::scope::FuncScope;
use crate::types::{Package, Type, TypeTable};

pub const ERRORS_PATH: &str = "errors";

/// Fixes the file's imports: packages mentioned by generated code, then the
/// codec packages and `errors` when some method can fail on its own.
pub fn prepare_scope(mtyp: &mut MarshalType<'_>, formats: &[Format]) {
    let types = mtyp.types();
    let spelled = spelled_types(mtyp);
    // conversion targets can name local types the struct itself never mentions
    for ty in &spelled {
        mtyp.scope.add_references(types, ty);
    }
    let used = referenced_packages(types, &spelled);
    mtyp.scope.retain_pending(|pkg| used.contains(&pkg.path));
    mtyp.scope.seal();
    for format in formats {
        if let Some(path) = format.import_path() {
            mtyp.scope.package_alias(&Package::std(path));
        }
    }
    let checks_length = mtyp
        .fields
        .iter()
        .any(|f| f.encode_plan(types).checks_length() || f.decode_plan(types).checks_length());
    if mtyp.has_required_fields(formats) || checks_length {
        mtyp.scope.package_alias(&Package::std(ERRORS_PATH));
    }
}

/// Methods for every format, encode before decode.
pub fn generate(mtyp: &MarshalType<'_>, formats: &[Format]) -> Vec<FuncDecl> {
    formats
        .iter()
        .flat_map(|&format| [encode_method(mtyp, format), decode_method(mtyp, format)])
        .collect()
}

// Every type the generated code spells out: intermediate fields and
// conversion targets.
fn spelled_types(mtyp: &MarshalType<'_>) -> Vec<Type> {
    let types = mtyp.types();
    let mut spelled = Vec::new();
    for f in &mtyp.fields {
        spelled.push(f.encode_type.clone());
        spelled.push(f.decode_type.clone());
        collect_targets(&f.encode_plan(types).step, &mut spelled);
        collect_targets(&f.decode_plan(types).step, &mut spelled);
    }
    spelled
}

fn referenced_packages(types: &TypeTable, spelled: &[Type]) -> HashSet<String> {
    let mut paths = HashSet::new();
    for ty in spelled {
        types.walk_named(ty, &mut |id| {
            if let Some(pkg) = &types.named(id).package {
                paths.insert(pkg.path.clone());
            }
        });
    }
    paths
}

fn collect_targets(step: &ConversionStep, out: &mut Vec<Type>) {
    match step {
        ConversionStep::Cast { to } | ConversionStep::Narrow { to } => out.push(to.clone()),
        ConversionStep::Sequence(seq) => {
            out.push(seq.target.clone());
            collect_targets(&seq.key, out);
            collect_targets(&seq.value, out);
        }
        ConversionStep::Direct | ConversionStep::Invalid(_) => {}
    }
}

// ————————————————————————————————————————————————————————————————————————————
// Method builder
// ————————————————————————————————————————————————————————————————————————————

struct MethodBuilder<'m, 'p> {
    mtyp: &'m MarshalType<'p>,
    format: Format,
    /// Encoders return a value before the error.
    encoding: bool,
    scope: FuncScope<'m>,
    loop_vars: Option<(String, String)>,
}

impl<'m, 'p> MethodBuilder<'m, 'p> {
    fn new(mtyp: &'m MarshalType<'p>, format: Format, encoding: bool) -> Self {
        Self { mtyp, format, encoding, scope: FuncScope::new(&mtyp.scope), loop_vars: None }
    }

    fn ty(&self, ty: &Type) -> String {
        self.mtyp.type_string(ty)
    }

    fn package(&self, path: &str) -> Expr {
        match self.scope.file().alias_of(path) {
            Some(alias) => Expr::name(alias),
            None => panic!("BUG: package {path:?} used by generated code was never imported"),
        }
    }

    fn intermediate(&self, name: &str, ty: impl Fn(&MarshalField) -> &Type) -> Stmt {
        let fields = self
            .mtyp
            .fields
            .iter()
            .map(|f| FieldDecl { name: f.name.clone(), ty: self.ty(ty(f)), tag: f.tag.clone() })
            .collect();
        Stmt::Type(StructDecl { name: name.to_string(), fields })
    }

    /// `return [nil, ]errors.New(message)` for the method being built.
    fn fail(&self, message: String) -> Stmt {
        let new_error = self.package(ERRORS_PATH).field("New").call(vec![Expr::Str(message)]);
        if self.encoding { Stmt::Return(vec![Expr::Nil, new_error]) } else { Stmt::Return(vec![new_error]) }
    }

    /// Statements that store `from` into `to` following `plan`. Unless `from`
    /// is `known_present`, a dereferenced pointer and a sequence loop each
    /// get a nil guard.
    fn convert(&mut self, f: &MarshalField, from: Expr, to: Expr, plan: ConversionPlan, known_present: bool) -> Vec<Stmt> {
        let source = from.clone();
        let (from, guard) = match plan.adjust {
            PointerAdjust::None => (from, false),
            PointerAdjust::Deref => (from.deref(), !known_present),
            PointerAdjust::AddressOf => (from.address_of(), false),
        };
        let stmts = match plan.step {
            ConversionStep::Direct => vec![Stmt::assign(to, from)],
            ConversionStep::Cast { to: ty } => vec![Stmt::assign(to, Expr::convert(self.ty(&ty), from))],
            ConversionStep::Narrow { to: ty } => {
                let value = self.scope.new_ident("v");
                let ok = self.scope.new_ident("ok");
                let assertion = Expr::Assert(Box::new(from), self.ty(&ty));
                vec![Stmt::If {
                    init: Some(Box::new(Stmt::Define { names: vec![value.clone(), ok.clone()], value: assertion })),
                    cond: Expr::name(ok),
                    body: vec![Stmt::assign(to, Expr::name(value))],
                }]
            }
            ConversionStep::Sequence(seq) => self.sequence(f, from, to, &seq, known_present),
            ConversionStep::Invalid(reason) => panic!("BUG: invalid conversion of {}.{}: {reason}", self.mtyp.name, f.name),
        };
        if guard { vec![Stmt::when(source.not_nil(), stmts)] } else { stmts }
    }

    fn loop_vars(&mut self) -> (String, String) {
        if let Some(vars) = &self.loop_vars {
            return vars.clone();
        }
        let vars = (self.scope.new_ident("k"), self.scope.new_ident("v"));
        self.loop_vars = Some(vars.clone());
        vars
    }

    fn sequence(&mut self, f: &MarshalField, from: Expr, to: Expr, seq: &Sequence, known_present: bool) -> Vec<Stmt> {
        let (k, v) = self.loop_vars();
        let key = self.element(Expr::name(&k), &seq.key);
        let value = self.element(Expr::name(&v), &seq.value);
        let range = Stmt::Range {
            key: k,
            value: v,
            over: from.clone(),
            body: vec![Stmt::assign(to.clone().index(key), value)],
        };
        let make = Expr::name("make").call(vec![
            Expr::Type(self.ty(&seq.target)),
            Expr::name("len").call(vec![from.clone()]),
        ]);
        let stmts = match seq.kind {
            // arrays are never nil
            SequenceKind::Array => return vec![range],
            SequenceKind::ArrayToSlice => return vec![Stmt::assign(to, make), range],
            SequenceKind::Slice | SequenceKind::Map => vec![Stmt::assign(to, make), range],
            SequenceKind::SliceToArray { len } => {
                let message =
                    format!("field '{}' for {} must have {len} elements", f.encoded_name(self.format), self.mtyp.name);
                let mismatch = Expr::NotEqual(
                    Box::new(Expr::name("len").call(vec![from.clone()])),
                    Box::new(Expr::name(len.to_string())),
                );
                vec![Stmt::when(mismatch, vec![self.fail(message)]), range]
            }
        };
        if known_present { stmts } else { vec![Stmt::when(from.not_nil(), stmts)] }
    }

    fn element(&self, value: Expr, step: &ConversionStep) -> Expr {
        match step {
            ConversionStep::Direct => value,
            ConversionStep::Cast { to } => Expr::convert(self.ty(to), value),
            other => panic!("BUG: element conversion {other:?} inside a sequence loop"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// Encode / decode
// ————————————————————————————————————————————————————————————————————————————

pub fn encode_method(mtyp: &MarshalType<'_>, format: Format) -> FuncDecl {
    let mut m = MethodBuilder::new(mtyp, format, true);
    let recv = m.scope.new_ident(&mtyp.receiver_name());
    let intertype = m.scope.new_ident(&format!("{}{}", mtyp.name, format.upper()));
    let enc = m.scope.new_ident("enc");

    let mut body = vec![
        m.intermediate(&intertype, |f| &f.encode_type),
        Stmt::Var { name: enc.clone(), ty: intertype },
    ];
    let types = mtyp.types();
    for f in &mtyp.fields {
        let from = Expr::name(&recv).field(&f.name);
        let to = Expr::name(&enc).field(&f.name);
        body.extend(m.convert(f, from, to, f.encode_plan(types), false));
    }
    let enc_ref = Expr::name(&enc).address_of();
    let (results, values) = match format {
        Format::Json => {
            let marshal = m.package("encoding/json").field("Marshal");
            (vec!["[]byte", "error"], vec![marshal.call(vec![enc_ref])])
        }
        Format::Yaml => (vec!["interface{}", "error"], vec![enc_ref, Expr::Nil]),
    };
    body.push(Stmt::Return(values));

    let name = format.encode_method();
    FuncDecl {
        doc: format!("{name} marshals as {}.", m.format.upper()),
        receiver: Param { name: recv, ty: mtyp.name.clone() },
        name,
        params: Vec::new(),
        results: results.into_iter().map(String::from).collect(),
        body,
    }
}

pub fn decode_method(mtyp: &MarshalType<'_>, format: Format) -> FuncDecl {
    let mut m = MethodBuilder::new(mtyp, format, false);
    let recv = m.scope.new_ident(&mtyp.receiver_name());
    let input = match format {
        Format::Json => Param { name: m.scope.new_ident("input"), ty: "[]byte".into() },
        Format::Yaml => Param { name: m.scope.new_ident("unmarshal"), ty: "func(interface{}) error".into() },
    };
    let intertype = m.scope.new_ident(&format!("{}{}", mtyp.name, format.upper()));
    let dec = m.scope.new_ident("dec");
    let err = m.scope.new_ident("err");

    let dec_ref = Expr::name(&dec).address_of();
    let decode_call = match format {
        Format::Json => m.package("encoding/json").field("Unmarshal").call(vec![Expr::name(&input.name), dec_ref]),
        Format::Yaml => Expr::name(&input.name).call(vec![dec_ref]),
    };
    let mut body = vec![
        m.intermediate(&intertype, |f| &f.decode_type),
        Stmt::Var { name: dec.clone(), ty: intertype },
        Stmt::If {
            init: Some(Box::new(Stmt::Define { names: vec![err.clone()], value: decode_call })),
            cond: Expr::name(&err).not_nil(),
            body: vec![Stmt::Return(vec![Expr::name(&err)])],
        },
    ];

    let work = m.scope.new_ident(&mtyp.receiver_name());
    body.push(Stmt::Define { names: vec![work.clone()], value: Expr::name(&recv).deref() });
    let types = mtyp.types();
    for f in &mtyp.fields {
        let from = Expr::name(&dec).field(&f.name);
        let to = Expr::name(&work).field(&f.name);
        if f.is_optional(format) {
            let conversion = m.convert(f, from.clone(), to, f.decode_plan(types), true);
            body.push(Stmt::when(from.not_nil(), conversion));
        } else {
            let message = format!("missing required field '{}' for {}", f.encoded_name(format), mtyp.name);
            body.push(Stmt::when(from.clone().is_nil(), vec![m.fail(message)]));
            body.extend(m.convert(f, from, to, f.decode_plan(types), true));
        }
    }
    body.push(Stmt::assign(Expr::name(&recv).deref(), Expr::name(&work)));
    body.push(Stmt::Return(vec![Expr::Nil]));

    let name = format.decode_method();
    FuncDecl {
        doc: format!("{name} unmarshals from {}.", format.upper()),
        receiver: Param { name: recv, ty: format!("*{}", mtyp.name) },
        name,
        params: vec![input],
        results: vec!["error".into()],
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{LoadedPackage, parse_package};
    use crate::diagnostics::Diagnostics;
    use crate::printer;

    fn pkg(types: &str) -> LoadedPackage {
        let src = format!(r#"{{ "package": "p", "path": "example.com/p", "types": {types} }}"#);
        parse_package("p/types.json", &src).unwrap()
    }

    fn render(pkg: &LoadedPackage, over: Option<&str>, format: Format) -> (String, String) {
        let mut diags = Diagnostics::default();
        let mut mtyp = MarshalType::build(pkg, &pkg.lookup_struct("X").unwrap(), &mut diags);
        if let Some(over) = over {
            mtyp.load_overrides(&pkg.lookup_struct(over).unwrap(), &mut diags).unwrap();
        }
        prepare_scope(&mut mtyp, &[format]);
        let mut enc = String::new();
        printer::print_func(&mut enc, &encode_method(&mtyp, format));
        let mut dec = String::new();
        printer::print_func(&mut dec, &decode_method(&mtyp, format));
        (enc, dec)
    }

    #[test]
    fn required_fields_fail_before_anything_is_written() {
        let pkg = pkg(r#"{ "X": { "struct": [
            { "name": "Required", "type": "int", "tag": "gencodec:\"required\"" },
            { "name": "NotRequired", "type": "int", "tag": "gencodec:\"required\" json:\"-\"" }
        ] } }"#);
        let (_, dec) = render(&pkg, None, Format::Json);
        let want = r#"// UnmarshalJSON unmarshals from JSON.
func (x *X) UnmarshalJSON(input []byte) error {
	type XJSON struct {
		Required    *int `gencodec:"required"`
		NotRequired *int `gencodec:"required" json:"-"`
	}
	var dec XJSON
	if err := json.Unmarshal(input, &dec); err != nil {
		return err
	}
	x1 := *x
	if dec.Required == nil {
		return errors.New("missing required field 'required' for X")
	}
	x1.Required = *dec.Required
	if dec.NotRequired != nil {
		x1.NotRequired = *dec.NotRequired
	}
	*x = x1
	return nil
}
"#;
        assert_eq!(dec, want);
    }

    #[test]
    fn encode_uses_unwrapped_override_types() {
        let pkg = pkg(r#"{
            "replacedInt": { "underlying": "int" },
            "X": { "struct": [ { "name": "Int", "type": "int", "tag": "json:\",omitempty\"" } ] },
            "Xo": { "struct": [ { "name": "Int", "type": "replacedInt" } ] }
        }"#);
        let (enc, dec) = render(&pkg, Some("Xo"), Format::Json);
        let want = r#"// MarshalJSON marshals as JSON.
func (x X) MarshalJSON() ([]byte, error) {
	type XJSON struct {
		Int replacedInt `json:",omitempty"`
	}
	var enc XJSON
	enc.Int = replacedInt(x.Int)
	return json.Marshal(&enc)
}
"#;
        assert_eq!(enc, want);
        assert!(dec.contains("\t\tInt *replacedInt `json:\",omitempty\"`\n"), "{dec}");
        assert!(dec.contains("\tx1.Int = int(*dec.Int)\n"), "{dec}");
    }

    #[test]
    fn yaml_methods_take_the_codec_as_argument() {
        let pkg = pkg(r#"{ "X": { "struct": [ { "name": "Name", "type": "string", "tag": "optional:\"true\"" } ] } }"#);
        let (enc, dec) = render(&pkg, None, Format::Yaml);
        assert!(enc.starts_with("// MarshalYAML marshals as YAML.\nfunc (x X) MarshalYAML() (interface{}, error) {\n"));
        assert!(enc.ends_with("\treturn &enc, nil\n}\n"));
        assert!(dec.contains("func (x *X) UnmarshalYAML(unmarshal func(interface{}) error) error {\n"));
        assert!(dec.contains("\tif err := unmarshal(&dec); err != nil {\n"));
        assert!(!dec.contains("errors.New"));
    }

    #[test]
    fn maps_convert_entry_by_entry_behind_a_nil_guard() {
        let pkg = pkg(r#"{
            "replacedString": { "underlying": "string" },
            "replacedInt": { "underlying": "int" },
            "X": { "struct": [ { "name": "M", "type": "map[string]int", "tag": "optional:\"yes\"" } ] },
            "Xo": { "struct": [ { "name": "M", "type": "map[replacedString]replacedInt" } ] }
        }"#);
        let (enc, dec) = render(&pkg, Some("Xo"), Format::Json);
        assert!(enc.contains(
            "\tif x.M != nil {
\t\tenc.M = make(map[replacedString]replacedInt, len(x.M))
\t\tfor k, v := range x.M {
\t\t\tenc.M[replacedString(k)] = replacedInt(v)
\t\t}
\t}
"
        ), "{enc}");
        assert!(dec.contains(
            "\tif dec.M != nil {
\t\tx1.M = make(map[string]int, len(dec.M))
\t\tfor k, v := range dec.M {
\t\t\tx1.M[string(k)] = int(v)
\t\t}
\t}
"
        ), "{dec}");
    }

    #[test]
    fn interface_overrides_narrow_with_a_checked_assertion() {
        let pkg = pkg(r#"{
            "Iface": { "interface": ["Method"] },
            "Impl": { "struct": [], "methods": [{ "name": "Method", "pointer": true }] },
            "X": { "struct": [ { "name": "Field", "type": "Iface" } ] },
            "Xo": { "struct": [ { "name": "Field", "type": "*Impl" } ] }
        }"#);
        let (enc, dec) = render(&pkg, Some("Xo"), Format::Json);
        assert!(enc.contains("\tif v, ok := x.Field.(*Impl); ok {\n\t\tenc.Field = v\n\t}\n"), "{enc}");
        assert!(dec.contains("\tx1.Field = dec.Field\n"), "{dec}");
    }

    #[test]
    fn generated_names_avoid_local_types() {
        let pkg = pkg(r#"{
            "XJSON": { "struct": [] },
            "enc": { "underlying": "int" },
            "X": { "struct": [ { "name": "A", "type": "XJSON" }, { "name": "B", "type": "int" } ] },
            "Xo": { "struct": [ { "name": "B", "type": "enc" } ] }
        }"#);
        let (enc, _) = render(&pkg, Some("Xo"), Format::Json);
        assert!(enc.contains("\ttype XJSON1 struct {\n"), "{enc}");
        assert!(enc.contains("\tvar enc1 XJSON1\n"), "{enc}");
        assert!(enc.contains("\tenc1.B = enc(x.B)\n"), "{enc}");
    }

    #[test]
    #[should_panic(expected = "BUG: invalid conversion")]
    fn unvalidated_conversions_are_internal_faults() {
        let pkg = pkg(r#"{ "X": { "struct": [ { "name": "F", "type": "string" } ] } }"#);
        let mut diags = Diagnostics::default();
        let mut mtyp = MarshalType::build(&pkg, &pkg.lookup_struct("X").unwrap(), &mut diags);
        // bypass the override merger, which would have rejected this
        mtyp.fields[0].encode_type = Type::Basic(crate::types::Basic::Bool);
        prepare_scope(&mut mtyp, &[Format::Json]);
        encode_method(&mtyp, Format::Json);
    }

    #[test]
    fn value_receiver_overrides_read_through_the_wrapper() {
        let pkg = pkg(r#"{
            "Iface": { "interface": ["Method"] },
            "Impl": { "struct": [], "methods": [{ "name": "Method", "pointer": false }] },
            "X": { "struct": [ { "name": "Field", "type": "Iface" } ] },
            "Xo": { "struct": [ { "name": "Field", "type": "Impl" } ] }
        }"#);
        let (enc, dec) = render(&pkg, Some("Xo"), Format::Json);
        assert!(enc.contains("\tif v, ok := x.Field.(Impl); ok {\n\t\tenc.Field = v\n\t}\n"), "{enc}");
        assert!(dec.contains("\t\tField *Impl\n"), "{dec}");
        assert!(dec.contains("\tx1.Field = *dec.Field\n"), "{dec}");
    }

    #[test]
    fn nil_pointers_are_not_dereferenced_on_encode() {
        let pkg = pkg(r#"{
            "myInt": { "underlying": "int" },
            "X": { "struct": [ { "name": "F", "type": "*int", "tag": "optional:\"true\"" } ] },
            "Xo": { "struct": [ { "name": "F", "type": "myInt" } ] }
        }"#);
        let (enc, _) = render(&pkg, Some("Xo"), Format::Json);
        assert!(enc.contains("\tif x.F != nil {\n\t\tenc.F = myInt(*x.F)\n\t}\n"), "{enc}");
    }

    #[test]
    fn element_types_of_override_targets_are_reserved() {
        let pkg = pkg(r#"{
            "enc": { "underlying": "int" },
            "MyMap": { "underlying": "map[string]enc" },
            "X": { "struct": [ { "name": "M", "type": "map[string]int" } ] },
            "Xo": { "struct": [ { "name": "M", "type": "MyMap" } ] }
        }"#);
        let (enc, _) = render(&pkg, Some("Xo"), Format::Json);
        assert!(enc.contains("\tvar enc1 XJSON\n"), "{enc}");
        assert!(enc.contains("\t\t\tenc1.M[k] = enc(v)\n"), "{enc}");
    }

    #[test]
    fn slices_into_arrays_check_the_length() {
        let pkg = pkg(r#"{
            "X": { "struct": [ { "name": "S", "type": "[]int", "tag": "json:\"items\"" } ] },
            "Xo": { "struct": [ { "name": "S", "type": "[2]int" } ] }
        }"#);
        let (enc, dec) = render(&pkg, Some("Xo"), Format::Yaml);
        let want = "\tif x.S != nil {
\t\tif len(x.S) != 2 {
\t\t\treturn nil, errors.New(\"field 's' for X must have 2 elements\")
\t\t}
\t\tfor k, v := range x.S {
\t\t\tenc.S[k] = v
\t\t}
\t}
";
        assert!(enc.contains(want), "{enc}");
        assert!(dec.contains("\tx1.S = make([]int, len(*dec.S))\n\tfor k, v := range *dec.S {\n"), "{dec}");
    }
}
