use super::MarshalType;
use crate::catalog::StructDecl;
use crate::diagnostics::Diagnostics;
use crate::error::Error;

impl MarshalType<'_> {
    /// Replaces field types with those of the same-named fields of `over`.
    ///
    /// Every override field must be exported, named, present on the original
    /// struct and convertible in both directions. Nothing is changed unless
    /// all of them pass.
    pub fn load_overrides(&mut self, over: &StructDecl, diags: &mut Diagnostics) -> Result<(), Error> {
        let rules = self.types();
        let mut replacements = Vec::with_capacity(over.fields.len());
        for of in &over.fields {
            if of.embedded || !of.is_exported() {
                return Err(Error::OverrideShape { pos: of.pos.clone(), name: of.name.clone() });
            }
            let Some(index) = self.fields.iter().position(|f| f.name == of.name) else {
                return Err(Error::NoMatchingField {
                    pos: of.pos.clone(),
                    name: of.name.clone(),
                    owner: self.name.clone(),
                });
            };
            // validated with the very plans synthesis will use
            let mut candidate = self.fields[index].clone();
            candidate.set_type(rules, of.ty.clone());
            candidate
                .decode_plan(rules)
                .into_result()
                .and_then(|_| candidate.encode_plan(rules).into_result())
                .map_err(|reason| Error::InvalidOverride { pos: of.pos.clone(), reason })?;
            candidate.overridden = true;
            replacements.push((index, of, candidate));
        }

        for (index, of, candidate) in replacements {
            diags.note(candidate.pos.clone(), format!("type replaced by {}.{}", over.name, of.name));
            self.scope.add_references(rules, &of.ty);
            self.fields[index] = candidate;
        }
        self.scope.reserve(&over.name);
        self.override_name = Some(over.name.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{LoadedPackage, parse_package};
    use crate::convert::Part;
    use crate::diagnostics::Diagnostics;
    use crate::error::Error;
    use crate::model::MarshalType;

    fn pkg() -> LoadedPackage {
        parse_package(
            "o/types.json",
            r#"{
                "package": "o",
                "imports": { "big": { "path": "math/big", "types": { "Int": { "struct": [] } } } },
                "types": {
                    "replacedInt": { "underlying": "int" },
                    "Big": { "underlying": "big.Int" },
                    "X": { "struct": [
                        { "name": "Int", "type": "int" },
                        { "name": "Map", "type": "map[string]int" },
                        { "name": "Num", "type": "big.Int" },
                        { "name": "Name", "type": "string" }
                    ] },
                    "Good": { "struct": [
                        { "name": "Map", "type": "map[string]replacedInt" },
                        { "name": "Int", "type": "replacedInt" },
                        { "name": "Num", "type": "*Big" }
                    ] },
                    "Unexported": { "struct": [ { "name": "int", "type": "replacedInt" } ] },
                    "Embedded": { "struct": [ { "name": "Int", "type": "replacedInt", "embedded": true } ] },
                    "Missing": { "struct": [ { "name": "Other", "type": "int" } ] },
                    "Bad": { "struct": [ { "name": "Name", "type": "replacedInt" } ] },
                    "BadMap": { "struct": [ { "name": "Map", "type": "map[string]bool" } ] }
                }
            }"#,
        )
        .unwrap()
    }

    fn merge<'a>(pkg: &'a LoadedPackage, over: &str) -> (MarshalType<'a>, Result<(), Error>) {
        let mut diags = Diagnostics::default();
        let mut mtyp = MarshalType::build(pkg, &pkg.lookup_struct("X").unwrap(), &mut diags);
        let result = mtyp.load_overrides(&pkg.lookup_struct(over).unwrap(), &mut diags);
        (mtyp, result)
    }

    #[test]
    fn replaces_types_but_keeps_model_order() {
        let pkg = pkg();
        let (mtyp, result) = merge(&pkg, "Good");
        result.unwrap();
        let rendered: Vec<_> = mtyp
            .fields
            .iter()
            .map(|f| (f.name.as_str(), mtyp.type_string(&f.encode_type), mtyp.type_string(&f.decode_type)))
            .collect();
        assert_eq!(
            rendered,
            vec![
                ("Int", "replacedInt".into(), "*replacedInt".into()),
                ("Map", "map[string]replacedInt".into(), "map[string]replacedInt".into()),
                ("Num", "*Big".into(), "*Big".into()),
                ("Name", "string".into(), "*string".into()),
            ]
        );
        assert_eq!(mtyp.override_name.as_deref(), Some("Good"));
        assert!(mtyp.fields[0].overridden && !mtyp.fields[3].overridden);
        assert!(mtyp.scope.is_used("Good"));
    }

    #[test]
    fn rejects_unexported_and_embedded_override_fields() {
        let pkg = pkg();
        let (_, result) = merge(&pkg, "Unexported");
        assert!(matches!(result, Err(Error::OverrideShape { .. })));
        let (_, result) = merge(&pkg, "Embedded");
        assert!(matches!(result, Err(Error::OverrideShape { .. })));
    }

    #[test]
    fn rejects_fields_missing_from_the_original() {
        let pkg = pkg();
        let (_, result) = merge(&pkg, "Missing");
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "o/types.json:Missing.Other: no matching field for Other in original type X");
    }

    #[test]
    fn rejects_unconvertible_overrides_without_touching_the_model() {
        let pkg = pkg();
        let (mtyp, result) = merge(&pkg, "Bad");
        let Err(Error::InvalidOverride { reason, .. }) = result else { panic!("expected an invalid override") };
        assert_eq!(reason.part, Part::Value);
        assert_eq!(reason.to_string(), "type string is not convertible to o.replacedInt");
        assert!(!mtyp.fields[3].overridden);
        assert_eq!(mtyp.override_name, None);

        let (_, result) = merge(&pkg, "BadMap");
        let Err(Error::InvalidOverride { reason, .. }) = result else { panic!("expected an invalid override") };
        assert_eq!(reason.part, Part::MapValue);
    }
}
