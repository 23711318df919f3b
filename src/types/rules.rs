//! Go's identity, assignability and conversion rules over `TypeTable`.
use super::{Basic, Package, Type, TypeTable};

/// Type queries needed by the conversion engine and the field model.
pub trait TypeRules {
    fn underlying<'a>(&'a self, ty: &'a Type) -> &'a Type;

    fn identical(&self, a: &Type, b: &Type) -> bool;

    /// Whether a value of type `from` may be assigned to `to` without a cast.
    fn assignable(&self, from: &Type, to: &Type) -> bool;

    /// Whether `to(x)` compiles for a (non-constant) `x` of type `from`.
    fn convertible(&self, from: &Type, to: &Type) -> bool;

    /// Whether the method set of `ty` covers the interface `iface`.
    fn implements(&self, ty: &Type, iface: &Type) -> bool;

    /// Human-readable rendering used in error messages.
    fn describe(&self, ty: &Type) -> String;

    fn is_interface(&self, ty: &Type) -> bool {
        matches!(self.underlying(ty), Type::Interface(_))
    }

    fn is_nil_checkable(&self, ty: &Type) -> bool {
        matches!(
            self.underlying(ty),
            Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Interface(_)
        )
    }

    fn slice_elem<'a>(&'a self, ty: &'a Type) -> Option<&'a Type> {
        match self.underlying(ty) {
            Type::Slice(elem) => Some(elem),
            _ => None,
        }
    }

    fn array_elem<'a>(&'a self, ty: &'a Type) -> Option<(u64, &'a Type)> {
        match self.underlying(ty) {
            Type::Array(len, elem) => Some((*len, elem)),
            _ => None,
        }
    }

    fn map_entry<'a>(&'a self, ty: &'a Type) -> Option<(&'a Type, &'a Type)> {
        match self.underlying(ty) {
            Type::Map(key, value) => Some((key, value)),
            _ => None,
        }
    }

    fn is_sequence(&self, ty: &Type) -> bool {
        matches!(self.underlying(ty), Type::Slice(_) | Type::Array(..) | Type::Map(..))
    }
}

// Predeclared basic types count as named for assignability.
fn is_named(ty: &Type) -> bool {
    matches!(ty, Type::Named(_) | Type::Basic(_))
}

impl TypeTable {
    fn identical_with(&self, a: &Type, b: &Type, ignore_tags: bool) -> bool {
        match (a, b) {
            (Type::Basic(x), Type::Basic(y)) => x.canonical() == y.canonical(),
            (Type::Named(x), Type::Named(y)) => x == y,
            (Type::Pointer(x), Type::Pointer(y)) | (Type::Slice(x), Type::Slice(y)) => {
                self.identical_with(x, y, ignore_tags)
            }
            (Type::Array(n, x), Type::Array(m, y)) => n == m && self.identical_with(x, y, ignore_tags),
            (Type::Map(k1, v1), Type::Map(k2, v2)) => {
                self.identical_with(k1, k2, ignore_tags) && self.identical_with(v1, v2, ignore_tags)
            }
            (Type::Interface(m1), Type::Interface(m2)) => m1 == m2,
            (Type::Struct(f1), Type::Struct(f2)) => {
                f1.len() == f2.len()
                    && f1.iter().zip(f2).all(|(a, b)| {
                        a.name == b.name
                            && a.embedded == b.embedded
                            && (ignore_tags || a.tag == b.tag)
                            && self.identical_with(&a.ty, &b.ty, ignore_tags)
                    })
            }
            _ => false,
        }
    }

    fn has_method(&self, ty: &Type, method: &str) -> bool {
        match ty {
            Type::Named(id) => match self.underlying(ty) {
                Type::Interface(methods) => methods.iter().any(|m| m == method),
                _ => self
                    .named(*id)
                    .methods
                    .iter()
                    .any(|m| m.name == method && !m.pointer_receiver),
            },
            Type::Pointer(elem) => match elem.as_ref() {
                Type::Named(id) if !self.is_interface(elem) => {
                    self.named(*id).methods.iter().any(|m| m.name == method)
                }
                _ => false,
            },
            Type::Interface(methods) => methods.iter().any(|m| m == method),
            _ => false,
        }
    }

    fn is_byte_or_rune_slice(&self, ty: &Type) -> bool {
        match self.slice_elem(ty).map(|elem| self.underlying(elem)) {
            Some(Type::Basic(b)) => matches!(b.canonical(), Basic::Uint8 | Basic::Int32),
            _ => false,
        }
    }
}

impl TypeRules for TypeTable {
    fn underlying<'a>(&'a self, ty: &'a Type) -> &'a Type {
        // the catalog rejects cyclic definitions before a table is handed out
        self.try_underlying(ty).unwrap_or(ty)
    }

    fn identical(&self, a: &Type, b: &Type) -> bool {
        self.identical_with(a, b, false)
    }

    fn assignable(&self, from: &Type, to: &Type) -> bool {
        if self.identical(from, to) {
            return true;
        }
        if (!is_named(from) || !is_named(to)) && self.identical(self.underlying(from), self.underlying(to)) {
            return true;
        }
        self.is_interface(to) && self.implements(from, to)
    }

    fn convertible(&self, from: &Type, to: &Type) -> bool {
        if self.assignable(from, to) {
            return true;
        }
        let (fu, tu) = (self.underlying(from), self.underlying(to));
        if self.identical_with(fu, tu, true) {
            return true;
        }
        if let (Type::Pointer(fe), Type::Pointer(te)) = (from, to)
            && self.identical_with(self.underlying(fe), self.underlying(te), true)
        {
            return true;
        }
        match (fu, tu) {
            (Type::Basic(f), Type::Basic(t)) => {
                let numeric = |b: &Basic| b.is_integer() || b.is_float();
                (numeric(f) && numeric(t))
                    || (f.is_complex() && t.is_complex())
                    || (f.is_integer() && *t == Basic::String)
            }
            (Type::Slice(_), Type::Basic(Basic::String)) => self.is_byte_or_rune_slice(fu),
            (Type::Basic(Basic::String), Type::Slice(_)) => self.is_byte_or_rune_slice(tu),
            _ => false,
        }
    }

    fn implements(&self, ty: &Type, iface: &Type) -> bool {
        match self.underlying(iface) {
            Type::Interface(methods) => methods.iter().all(|m| self.has_method(ty, m)),
            _ => false,
        }
    }

    fn describe(&self, ty: &Type) -> String {
        self.type_string(ty, &|p: &Package| Some(p.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Method, NamedId};

    struct Fixture {
        table: TypeTable,
        int: Type,
        my_int: Type,
        my_int2: Type,
        iface: Type,
        impl_: NamedId,
    }

    fn fixture() -> Fixture {
        let mut table = TypeTable::new();
        let pkg = Some(Package::new("p", "example.com/p"));
        let my_int = table.declare("myInt", pkg.clone());
        table.define(my_int, Type::Basic(Basic::Int), Vec::new());
        let my_int2 = table.declare("myInt2", pkg.clone());
        table.define(my_int2, Type::Basic(Basic::Int), Vec::new());
        let iface = table.declare("Iface", pkg.clone());
        table.define(iface, Type::Interface(vec!["Method".into()]), Vec::new());
        let impl_ = table.declare("Impl", pkg);
        table.define(
            impl_,
            Type::Struct(Vec::new()),
            vec![Method { name: "Method".into(), pointer_receiver: true }],
        );
        Fixture {
            table,
            int: Type::Basic(Basic::Int),
            my_int: Type::Named(my_int),
            my_int2: Type::Named(my_int2),
            iface: Type::Named(iface),
            impl_,
        }
    }

    #[test]
    fn named_types_need_a_cast_between_each_other() {
        let f = fixture();
        assert!(!f.table.assignable(&f.int, &f.my_int));
        assert!(!f.table.assignable(&f.my_int, &f.my_int2));
        assert!(f.table.convertible(&f.int, &f.my_int));
        assert!(f.table.convertible(&f.my_int, &f.my_int2));
    }

    #[test]
    fn unnamed_composites_assign_to_named_ones() {
        let mut f = fixture();
        let pkg = Some(Package::new("p", "example.com/p"));
        let named_slice = f.table.declare("ints", pkg);
        f.table.define(named_slice, Type::Slice(Box::new(f.int.clone())), Vec::new());
        let unnamed = Type::Slice(Box::new(f.int.clone()));
        assert!(f.table.assignable(&unnamed, &Type::Named(named_slice)));
        assert!(f.table.assignable(&Type::Named(named_slice), &unnamed));
    }

    #[test]
    fn method_sets_follow_receiver_kind() {
        let f = fixture();
        let value = Type::Named(f.impl_);
        let pointer = Type::pointer_to(value.clone());
        assert!(!f.table.implements(&value, &f.iface));
        assert!(f.table.implements(&pointer, &f.iface));
        assert!(f.table.assignable(&pointer, &f.iface));
        assert!(!f.table.assignable(&f.iface, &pointer));
    }

    #[test]
    fn everything_implements_the_empty_interface() {
        let f = fixture();
        let any = Type::empty_interface();
        assert!(f.table.assignable(&f.my_int, &any));
        assert!(f.table.is_nil_checkable(&any));
        assert!(!f.table.is_nil_checkable(&f.my_int));
    }

    #[test]
    fn string_conversions() {
        let f = fixture();
        let string = Type::Basic(Basic::String);
        let bytes = Type::Slice(Box::new(Type::Basic(Basic::Byte)));
        let floats = Type::Slice(Box::new(Type::Basic(Basic::Float64)));
        assert!(f.table.convertible(&bytes, &string));
        assert!(f.table.convertible(&string, &bytes));
        assert!(f.table.convertible(&f.my_int, &string));
        assert!(!f.table.convertible(&string, &f.int));
        assert!(!f.table.convertible(&floats, &string));
    }

    #[test]
    fn unnamed_pointers_convert_by_base_underlying() {
        let f = fixture();
        let a = Type::pointer_to(f.my_int.clone());
        let b = Type::pointer_to(f.my_int2.clone());
        assert!(f.table.convertible(&a, &b));
        assert!(!f.table.convertible(&a, &Type::pointer_to(Type::Basic(Basic::String))));
    }

    #[test]
    fn error_is_an_interface() {
        let f = fixture();
        assert!(f.table.is_interface(&f.table.error_type()));
        assert_eq!(f.table.describe(&f.my_int), "p.myInt");
    }
}
