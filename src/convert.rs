//! Conversion planning between a field's original and effective types.
//!
//! A plan is computed the same way for both directions; the synthesis layer
//! turns it into statements. Validation at override-merge time and synthesis
//! both take their plans from `MarshalField::encode_plan` and `decode_plan`,
//! so a plan accepted by one is accepted by the other.
use std::fmt;

use crate::types::{Type, TypeRules};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAdjust {
    None,
    /// Source is a pointer, read through it.
    Deref,
    /// Destination is a pointer, take the source's address.
    AddressOf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionPlan {
    pub adjust: PointerAdjust,
    pub step: ConversionStep,
}

impl ConversionPlan {
    pub fn into_result(self) -> Result<ConversionPlan, Unconvertible> {
        match self.step {
            ConversionStep::Invalid(reason) => Err(reason),
            _ => Ok(self),
        }
    }

    /// Whether the generated code can fail at runtime on a length mismatch.
    pub fn checks_length(&self) -> bool {
        matches!(&self.step, ConversionStep::Sequence(seq) if matches!(seq.kind, SequenceKind::SliceToArray { .. }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConversionStep {
    /// Plain assignment.
    Direct,
    /// One explicit conversion `T(x)`.
    Cast { to: Type },
    /// Checked type assertion from an interface to a concrete type.
    Narrow { to: Type },
    /// Element-wise conversion of a slice, array or map.
    Sequence(Box<Sequence>),
    Invalid(Unconvertible),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Slice,
    Array,
    Map,
    /// Fixed array into a freshly allocated slice.
    ArrayToSlice,
    /// Slice into a fixed array of `len` elements; other lengths are refused
    /// at runtime.
    SliceToArray { len: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub kind: SequenceKind,
    /// Destination type, used for allocation.
    pub target: Type,
    /// Always `Direct` for slices and arrays.
    pub key: ConversionStep,
    pub value: ConversionStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Value,
    SliceElement,
    MapKey,
    MapValue,
    NestedSequence,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Part::Value => "type",
            Part::SliceElement => "slice element type",
            Part::MapKey => "map key type",
            Part::MapValue => "map value type",
            Part::NestedSequence => "nested sequence type",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{part} {from} is not convertible to {to}")]
pub struct Unconvertible {
    pub part: Part,
    pub from: String,
    pub to: String,
}

impl Unconvertible {
    fn new(rules: &dyn TypeRules, part: Part, from: &Type, to: &Type) -> Self {
        Self { part, from: rules.describe(from), to: rules.describe(to) }
    }
}

/// Plans the conversion of a value of type `from` into a slot of type `to`.
///
/// The unadjusted plan wins when it is valid. Otherwise, if exactly one side
/// is a pointer, the plan is retried through a dereference or an address-of,
/// and the original reason is kept when that fails too.
pub fn resolve(rules: &dyn TypeRules, from: &Type, to: &Type) -> ConversionPlan {
    let step = plan_step(rules, from, to);
    if !matches!(step, ConversionStep::Invalid(_)) {
        return ConversionPlan { adjust: PointerAdjust::None, step };
    }
    let retry = match (from, to) {
        (Type::Pointer(elem), to) if !matches!(to, Type::Pointer(_)) => {
            Some((PointerAdjust::Deref, plan_step(rules, elem, to)))
        }
        (from, Type::Pointer(_)) if !matches!(from, Type::Pointer(_)) => {
            let addressed = Type::pointer_to(from.clone());
            Some((PointerAdjust::AddressOf, plan_step(rules, &addressed, to)))
        }
        _ => None,
    };
    match retry {
        Some((adjust, adjusted)) if !matches!(adjusted, ConversionStep::Invalid(_)) => {
            ConversionPlan { adjust, step: adjusted }
        }
        _ => ConversionPlan { adjust: PointerAdjust::None, step },
    }
}

/// Plans the conversion out of a pointer that only exists so absence can be
/// told by a nil check. Reading through it is preferred over any plan that
/// would keep the pointer itself.
pub fn resolve_wrapped(rules: &dyn TypeRules, from: &Type, to: &Type) -> ConversionPlan {
    if let Type::Pointer(elem) = from
        && !matches!(to, Type::Pointer(_))
    {
        let step = plan_step(rules, elem, to);
        if !matches!(step, ConversionStep::Invalid(_)) {
            return ConversionPlan { adjust: PointerAdjust::Deref, step };
        }
    }
    resolve(rules, from, to)
}

fn plan_step(rules: &dyn TypeRules, from: &Type, to: &Type) -> ConversionStep {
    if rules.assignable(from, to) {
        return ConversionStep::Direct;
    }
    if rules.convertible(from, to) {
        return ConversionStep::Cast { to: to.clone() };
    }
    if rules.is_interface(from) && !rules.is_interface(to) && rules.implements(to, from) {
        return ConversionStep::Narrow { to: to.clone() };
    }
    if let (Some(fe), Some(te)) = (rules.slice_elem(from), rules.slice_elem(to)) {
        let value = element(rules, fe, te, Part::SliceElement);
        return sequence(SequenceKind::Slice, to, ConversionStep::Direct, value);
    }
    if let (Some((n, fe)), Some((m, te))) = (rules.array_elem(from), rules.array_elem(to))
        && n == m
    {
        let value = element(rules, fe, te, Part::SliceElement);
        return sequence(SequenceKind::Array, to, ConversionStep::Direct, value);
    }
    if let (Some((_, fe)), Some(te)) = (rules.array_elem(from), rules.slice_elem(to)) {
        let value = element(rules, fe, te, Part::SliceElement);
        return sequence(SequenceKind::ArrayToSlice, to, ConversionStep::Direct, value);
    }
    if let (Some(fe), Some((len, te))) = (rules.slice_elem(from), rules.array_elem(to)) {
        let value = element(rules, fe, te, Part::SliceElement);
        return sequence(SequenceKind::SliceToArray { len }, to, ConversionStep::Direct, value);
    }
    if let (Some((fk, fv)), Some((tk, tv))) = (rules.map_entry(from), rules.map_entry(to)) {
        let key = element(rules, fk, tk, Part::MapKey);
        let value = element(rules, fv, tv, Part::MapValue);
        return sequence(SequenceKind::Map, to, key, value);
    }
    ConversionStep::Invalid(Unconvertible::new(rules, Part::Value, from, to))
}

// Elements of a sequence only get the scalar rules; anything that would need
// its own loop is rejected.
fn element(rules: &dyn TypeRules, from: &Type, to: &Type, part: Part) -> ConversionStep {
    if rules.assignable(from, to) {
        ConversionStep::Direct
    } else if rules.convertible(from, to) {
        ConversionStep::Cast { to: to.clone() }
    } else if rules.is_sequence(from) && rules.is_sequence(to) {
        ConversionStep::Invalid(Unconvertible::new(rules, Part::NestedSequence, from, to))
    } else {
        ConversionStep::Invalid(Unconvertible::new(rules, part, from, to))
    }
}

fn sequence(kind: SequenceKind, target: &Type, key: ConversionStep, value: ConversionStep) -> ConversionStep {
    for sub in [&key, &value] {
        if let ConversionStep::Invalid(reason) = sub {
            return ConversionStep::Invalid(reason.clone());
        }
    }
    ConversionStep::Sequence(Box::new(Sequence { kind, target: target.clone(), key, value }))
}
