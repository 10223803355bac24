//! Schema validation and codec compilation.
//!
//! Every variant's field table is checked once, when the registry is built.
//! Findings go to a [`DiagnosticSink`]; a table with any finding gets no
//! codec and its variant is handled as an opaque blob.

use crate::boxes::FourCC;
use crate::codec::{
    Collection, CompiledField, ElementCodec, EntryCodec, FieldStrategy, FlagGated, LengthStrategy,
    NulString, Reserved, Scalar, VersionSized,
};
use crate::field::{Element, FieldDescriptor, FieldType, Primitive};
use std::fmt;
use tracing::warn;

/// Supported widths of a collection length prefix.
pub const PREFIX_WIDTHS: [u8; 4] = [1, 2, 4, 8];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("container boxes cannot declare fields")]
    ContainerDeclaresFields,
    #[error("version-sized field requires a FullBox variant")]
    VersionSizedRequiresFullBox,
    #[error("version-sized field must be a 64-bit integer")]
    VersionSizedRequires64Bit,
    #[error("flag-gated field requires a FullBox variant")]
    FlagGateRequiresFullBox,
    #[error("flag mask {0:#x} must be non-zero and fit in 24 bits")]
    InvalidFlagMask(u32),
    #[error("reserved padding must be declared on an integer of at most 32 bits")]
    ReservedRequiresSmallInteger,
    #[error("reserved padding must be at least one byte")]
    ReservedRequiresPositiveSize,
    #[error("remaining-bytes collection must be the last field")]
    RemainingBytesNotLast,
    #[error("remaining-bytes collection needs fixed-size primitive elements")]
    RemainingBytesRequiresFixedElement,
    #[error("count source '{0}' is not a declared field")]
    UnknownCountSource(&'static str),
    #[error("count source '{0}' must be declared before the collection")]
    CountSourceNotEarlier(&'static str),
    #[error("count source '{0}' is not an integer field")]
    CountSourceNotInteger(&'static str),
    #[error("collection declares more than one length strategy")]
    ConflictingLengthStrategies,
    #[error("length prefix width {0} is not one of 1, 2, 4, 8")]
    UnsupportedPrefixWidth(u8),
    #[error("entry schema cannot compute its own size")]
    ElementSizeUnknown,
    #[error("length attributes on a field that is not a collection")]
    LengthStrategyOnScalar,
    #[error("field name declared twice")]
    DuplicateFieldName,
    #[error("field order {0} declared twice")]
    DuplicateOrder(u16),
    #[error("a variant with this key is already registered")]
    DuplicateVariant,
}

/// One schema finding, tied to the variant and (dotted) field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub typ: FourCC,
    pub field: Option<String>,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}: {}", self.typ, field, self.kind),
            None => write!(f, "{}: {}", self.typ, self.kind),
        }
    }
}

/// Receiver of registration-time schema findings.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Logs each finding at `warn` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, d: Diagnostic) {
        warn!(box_type = %d.typ, field = d.field.as_deref().unwrap_or("-"), "schema: {}", d.kind);
    }
}

struct Checker<'s> {
    typ: FourCC,
    full_box: bool,
    sink: &'s mut dyn DiagnosticSink,
    reports: usize,
}

impl Checker<'_> {
    fn report(&mut self, field: Option<String>, kind: DiagnosticKind) {
        self.reports += 1;
        self.sink.report(Diagnostic { typ: self.typ, field, kind });
    }
}

/// Validate a variant's layout and build its field codecs.
///
/// Returns `None` if any diagnostic was reported.
pub fn compile_layout(
    typ: FourCC,
    full_box: bool,
    container: bool,
    fields: &'static [FieldDescriptor],
    sink: &mut dyn DiagnosticSink,
) -> Option<Vec<CompiledField>> {
    let mut checker = Checker { typ, full_box, sink, reports: 0 };
    if container {
        if !fields.is_empty() {
            checker.report(None, DiagnosticKind::ContainerDeclaresFields);
            return None;
        }
        return Some(Vec::new());
    }
    let compiled = compile_fields(&mut checker, "", fields);
    if checker.reports > 0 { None } else { Some(compiled) }
}

fn compile_fields(
    ck: &mut Checker<'_>,
    prefix: &str,
    schema: &'static [FieldDescriptor],
) -> Vec<CompiledField> {
    let mut sorted: Vec<&'static FieldDescriptor> = schema.iter().collect();
    sorted.sort_by_key(|f| f.order);

    for (i, f) in sorted.iter().enumerate() {
        let path = format!("{prefix}{}", f.name);
        if sorted[..i].iter().any(|g| g.name == f.name) {
            ck.report(Some(path.clone()), DiagnosticKind::DuplicateFieldName);
        }
        if i > 0 && sorted[i - 1].order == f.order {
            ck.report(Some(path), DiagnosticKind::DuplicateOrder(f.order));
        }
    }

    let mut out = Vec::with_capacity(sorted.len());
    for (i, f) in sorted.iter().enumerate() {
        let is_last = i + 1 == sorted.len();
        if let Some(strategy) = compile_field(ck, prefix, &sorted, f, is_last) {
            out.push(CompiledField { name: f.name, ty: f.ty, strategy });
        }
    }
    out
}

fn compile_field(
    ck: &mut Checker<'_>,
    prefix: &str,
    sorted: &[&'static FieldDescriptor],
    f: &'static FieldDescriptor,
    is_last: bool,
) -> Option<Box<dyn FieldStrategy>> {
    let path = || Some(format!("{prefix}{}", f.name));
    let start = ck.reports;

    if f.version_threshold.is_some() {
        if !ck.full_box {
            ck.report(path(), DiagnosticKind::VersionSizedRequiresFullBox);
        }
        if !matches!(f.ty, FieldType::Primitive(Primitive::U64 | Primitive::I64)) {
            ck.report(path(), DiagnosticKind::VersionSizedRequires64Bit);
        }
    }

    if let Some(mask) = f.flag_mask {
        if !ck.full_box {
            ck.report(path(), DiagnosticKind::FlagGateRequiresFullBox);
        }
        if mask == 0 || mask > 0x00FF_FFFF {
            ck.report(path(), DiagnosticKind::InvalidFlagMask(mask));
        }
    }

    if let Some(bytes) = f.reserved_bytes {
        let small = matches!(f.ty, FieldType::Primitive(p) if p.is_integer() && p.size() <= 4);
        if !small {
            ck.report(path(), DiagnosticKind::ReservedRequiresSmallInteger);
        }
        if bytes == 0 {
            ck.report(path(), DiagnosticKind::ReservedRequiresPositiveSize);
        }
    }

    let mut collection = None;
    match f.ty {
        FieldType::List(element) => {
            let length = resolve_length(ck, sorted, f, element, is_last, path());
            let element = compile_element(ck, prefix, f, element, path());
            if let (Some(length), Some(element)) = (length, element) {
                collection = Some(Collection { name: f.name, element, length });
            }
        }
        _ => {
            if f.has_length_attr() || f.presized.is_some() {
                ck.report(path(), DiagnosticKind::LengthStrategyOnScalar);
            }
        }
    }

    if ck.reports > start {
        return None;
    }

    let base: Box<dyn FieldStrategy> = match (f.reserved_bytes, f.ty) {
        (Some(bytes), _) => Box::new(Reserved { bytes }),
        (None, FieldType::Primitive(p)) => match f.version_threshold {
            Some(threshold) => Box::new(VersionSized { name: f.name, threshold, signed: p.is_signed() }),
            None => Box::new(Scalar { name: f.name, ty: p }),
        },
        (None, FieldType::Str) => Box::new(NulString { name: f.name }),
        (None, FieldType::List(_)) => Box::new(collection?),
    };

    let strategy: Box<dyn FieldStrategy> = match f.flag_mask {
        Some(mask) => Box::new(FlagGated { mask, inner: base }),
        None => base,
    };
    Some(strategy)
}

fn resolve_length(
    ck: &mut Checker<'_>,
    sorted: &[&'static FieldDescriptor],
    f: &'static FieldDescriptor,
    element: Element,
    is_last: bool,
    path: Option<String>,
) -> Option<LengthStrategy> {
    let declared = [
        f.count_from.is_some(),
        f.length_prefix.is_some(),
        f.remaining_bytes,
        f.presized.is_some(),
    ];
    if declared.iter().filter(|d| **d).count() > 1 {
        ck.report(path.clone(), DiagnosticKind::ConflictingLengthStrategies);
        return None;
    }

    if let Some(width) = f.length_prefix {
        if !PREFIX_WIDTHS.contains(&width) {
            ck.report(path.clone(), DiagnosticKind::UnsupportedPrefixWidth(width));
            return None;
        }
        return Some(LengthStrategy::LengthPrefixed(width));
    }

    if f.remaining_bytes {
        let mut valid = true;
        if !is_last {
            ck.report(path.clone(), DiagnosticKind::RemainingBytesNotLast);
            valid = false;
        }
        if !matches!(element, Element::Primitive(_)) {
            ck.report(path.clone(), DiagnosticKind::RemainingBytesRequiresFixedElement);
            valid = false;
        }
        return valid.then_some(LengthStrategy::RemainingBytes);
    }

    if let Some(source) = f.count_from {
        let Some(index) = sorted.iter().position(|g| g.name == source) else {
            ck.report(path.clone(), DiagnosticKind::UnknownCountSource(source));
            return None;
        };
        let src = sorted[index];
        if src.order >= f.order {
            ck.report(path.clone(), DiagnosticKind::CountSourceNotEarlier(source));
            return None;
        }
        if !matches!(src.ty, FieldType::Primitive(p) if p.is_integer()) {
            ck.report(path.clone(), DiagnosticKind::CountSourceNotInteger(source));
            return None;
        }
        return Some(LengthStrategy::FromProperty { name: source, index });
    }

    Some(LengthStrategy::None(f.presized.unwrap_or(0)))
}

fn compile_element(
    ck: &mut Checker<'_>,
    prefix: &str,
    f: &'static FieldDescriptor,
    element: Element,
    path: Option<String>,
) -> Option<ElementCodec> {
    match element {
        Element::Primitive(p) => Some(ElementCodec::Primitive(p)),
        Element::Entry(schema) => {
            if schema.is_empty() || schema.iter().any(|g| g.remaining_bytes) {
                ck.report(path, DiagnosticKind::ElementSizeUnknown);
                return None;
            }
            let start = ck.reports;
            let fields = compile_fields(ck, &format!("{prefix}{}.", f.name), schema);
            if ck.reports > start {
                return None;
            }
            Some(ElementCodec::Entry(EntryCodec { schema, fields, uses_context: uses_context(schema) }))
        }
    }
}

/// Whether a schema (or any nested entry schema) reads version or flags.
fn uses_context(schema: &[FieldDescriptor]) -> bool {
    schema.iter().any(|f| {
        f.version_threshold.is_some()
            || f.flag_mask.is_some()
            || matches!(f.ty, FieldType::List(Element::Entry(inner)) if uses_context(inner))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor as F;

    fn check(full_box: bool, fields: &'static [F]) -> Vec<DiagnosticKind> {
        let mut sink = Vec::new();
        compile_layout(FourCC(*b"test"), full_box, false, fields, &mut sink);
        sink.into_iter().map(|d| d.kind).collect()
    }

    #[test]
    fn valid_layout_compiles() {
        const FIELDS: &[F] = &[
            F::new("count", 0, FieldType::U32),
            F::new("items", 1, FieldType::list(Primitive::U16)).count_from("count"),
        ];
        let mut sink = Vec::new();
        let compiled = compile_layout(FourCC(*b"test"), false, false, FIELDS, &mut sink);
        assert!(sink.is_empty());
        assert_eq!(compiled.map(|c| c.len()), Some(2));
    }

    #[test]
    fn fields_are_compiled_in_wire_order() {
        const FIELDS: &[F] = &[F::new("b", 1, FieldType::U8), F::new("a", 0, FieldType::U8)];
        let compiled = compile_layout(FourCC(*b"test"), false, false, FIELDS, &mut Vec::new());
        let names: Vec<_> = compiled.unwrap().iter().map(|c| c.name).collect();
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn version_and_flag_rules() {
        const PLAIN: &[F] = &[
            F::new("t", 0, FieldType::U64).version_sized(),
            F::new("o", 1, FieldType::U32).when_flag(1),
        ];
        assert_eq!(
            check(false, PLAIN),
            [DiagnosticKind::VersionSizedRequiresFullBox, DiagnosticKind::FlagGateRequiresFullBox]
        );

        const NARROW: &[F] = &[F::new("t", 0, FieldType::U32).version_sized()];
        assert_eq!(check(true, NARROW), [DiagnosticKind::VersionSizedRequires64Bit]);

        const WIDE_MASK: &[F] = &[F::new("o", 0, FieldType::U32).when_flag(0x0100_0000)];
        assert_eq!(check(true, WIDE_MASK), [DiagnosticKind::InvalidFlagMask(0x0100_0000)]);
    }

    #[test]
    fn reserved_rules() {
        const BIG: &[F] = &[F::new("r", 0, FieldType::U64).reserved(8)];
        assert_eq!(check(false, BIG), [DiagnosticKind::ReservedRequiresSmallInteger]);
        const EMPTY: &[F] = &[F::new("r", 0, FieldType::U16).reserved(0)];
        assert_eq!(check(false, EMPTY), [DiagnosticKind::ReservedRequiresPositiveSize]);
    }

    #[test]
    fn count_source_rules() {
        const LATER: &[F] = &[
            F::new("items", 0, FieldType::list(Primitive::U8)).count_from("count"),
            F::new("count", 1, FieldType::U32),
        ];
        assert_eq!(check(false, LATER), [DiagnosticKind::CountSourceNotEarlier("count")]);

        const MISSING: &[F] = &[F::new("items", 0, FieldType::list(Primitive::U8)).count_from("n")];
        assert_eq!(check(false, MISSING), [DiagnosticKind::UnknownCountSource("n")]);

        const STRING: &[F] = &[
            F::new("n", 0, FieldType::Str),
            F::new("items", 1, FieldType::list(Primitive::U8)).count_from("n"),
        ];
        assert_eq!(check(false, STRING), [DiagnosticKind::CountSourceNotInteger("n")]);
    }

    #[test]
    fn length_strategy_rules() {
        const BOTH: &[F] = &[
            F::new("n", 0, FieldType::U8),
            F::new("items", 1, FieldType::list(Primitive::U8)).count_from("n").length_prefixed(4),
        ];
        assert_eq!(check(false, BOTH), [DiagnosticKind::ConflictingLengthStrategies]);

        const WIDTH: &[F] = &[F::new("items", 0, FieldType::list(Primitive::U8)).length_prefixed(3)];
        assert_eq!(check(false, WIDTH), [DiagnosticKind::UnsupportedPrefixWidth(3)]);

        const SCALAR: &[F] = &[F::new("n", 0, FieldType::U32).length_prefixed(4)];
        assert_eq!(check(false, SCALAR), [DiagnosticKind::LengthStrategyOnScalar]);
    }

    #[test]
    fn entry_elements_must_size_themselves() {
        const OPEN: &[F] = &[F::new("rest", 0, FieldType::list(Primitive::U8)).remaining_bytes()];
        const FIELDS: &[F] = &[F::new("entries", 0, FieldType::entries(OPEN)).length_prefixed(4)];
        assert_eq!(check(false, FIELDS), [DiagnosticKind::ElementSizeUnknown]);
    }

    #[test]
    fn nested_findings_carry_a_dotted_path() {
        const ENTRY: &[F] = &[F::new("time", 0, FieldType::U64).version_sized()];
        const FIELDS: &[F] = &[F::new("entries", 0, FieldType::entries(ENTRY)).length_prefixed(4)];
        let mut sink = Vec::new();
        assert!(compile_layout(FourCC(*b"test"), false, false, FIELDS, &mut sink).is_none());
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].field.as_deref(), Some("entries.time"));
        assert_eq!(sink[0].to_string(), "test.entries.time: version-sized field requires a FullBox variant");
    }

    #[test]
    fn entry_context_detection() {
        const FLAGGED: &[F] = &[F::new("d", 0, FieldType::U32).when_flag(0x100)];
        const PLAIN: &[F] = &[F::new("d", 0, FieldType::U32)];
        assert!(uses_context(FLAGGED));
        assert!(!uses_context(PLAIN));
    }
}
