use crate::boxes::{BoxKey, BoxNode, FourCC, NodeKind};
use crate::codec::CompiledField;
use crate::field::{FieldDescriptor, default_record};
use crate::schema::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink, compile_layout};
use crate::value::Record;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Declaration of one box variant: its key, shape, and field table.
///
/// The built-in catalogue lives in [`crate::known_boxes`]; callers can add
/// their own through [`RegistryBuilder::with_box`].
#[derive(Debug, Clone, Copy)]
pub struct BoxDef {
    pub typ: FourCC,
    /// Extended type for `uuid` boxes.
    pub uuid: Option<[u8; 16]>,
    /// Human-readable name, e.g. "Movie Header Box".
    pub name: &'static str,
    pub full_box: bool,
    pub container: bool,
    pub fields: &'static [FieldDescriptor],
}

impl BoxDef {
    /// Plain box; no fields means an opaque payload.
    pub const fn leaf(typ: &[u8; 4], name: &'static str) -> Self {
        BoxDef { typ: FourCC(*typ), uuid: None, name, full_box: false, container: false, fields: &[] }
    }

    /// Box whose body starts with the version/flags word.
    pub const fn full(typ: &[u8; 4], name: &'static str) -> Self {
        BoxDef { full_box: true, ..Self::leaf(typ, name) }
    }

    pub const fn container(typ: &[u8; 4], name: &'static str) -> Self {
        BoxDef { container: true, ..Self::leaf(typ, name) }
    }

    /// `uuid` box identified by its extended type.
    pub const fn extended(uuid: [u8; 16], name: &'static str) -> Self {
        BoxDef { uuid: Some(uuid), ..Self::leaf(b"uuid", name) }
    }

    pub const fn as_full(self) -> Self {
        BoxDef { full_box: true, ..self }
    }

    pub const fn with_fields(self, fields: &'static [FieldDescriptor]) -> Self {
        BoxDef { fields, ..self }
    }

    pub fn key(&self) -> BoxKey {
        match self.uuid {
            Some(u) => BoxKey::Uuid(u),
            None => BoxKey::FourCC(self.typ),
        }
    }
}

#[derive(Debug)]
pub(crate) enum Layout {
    Container,
    Fields(Vec<CompiledField>),
    Opaque,
}

/// A registered variant with its compiled codecs. Shared by every node of
/// that type.
#[derive(Debug)]
pub struct Variant {
    pub typ: FourCC,
    pub uuid: Option<[u8; 16]>,
    pub name: &'static str,
    pub full_box: bool,
    pub(crate) layout: Layout,
    defaults: &'static [FieldDescriptor],
}

impl Variant {
    /// Passthrough variant for tags nothing is registered for.
    pub(crate) fn opaque(typ: FourCC, uuid: Option<[u8; 16]>) -> Self {
        Variant {
            typ,
            uuid,
            name: "Unknown Box",
            full_box: false,
            layout: Layout::Opaque,
            defaults: &[],
        }
    }

    fn compile(def: &BoxDef, sink: &mut dyn DiagnosticSink) -> Self {
        let layout = match compile_layout(def.typ, def.full_box, def.container, def.fields, sink) {
            Some(_) if def.container => Layout::Container,
            Some(fields) if !fields.is_empty() => Layout::Fields(fields),
            Some(_) => Layout::Opaque,
            None => {
                debug!(box_type = %def.typ, "schema rejected, falling back to opaque payload");
                Layout::Opaque
            }
        };
        Variant {
            typ: def.typ,
            uuid: def.uuid,
            name: def.name,
            full_box: def.full_box,
            layout,
            defaults: def.fields,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.layout, Layout::Container)
    }

    /// True when payloads of this variant are decoded into fields.
    pub fn has_fields(&self) -> bool {
        matches!(self.layout, Layout::Fields(_))
    }

    pub(crate) fn codec(&self) -> Option<&[CompiledField]> {
        match &self.layout {
            Layout::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    pub(crate) fn field(&self, name: &str) -> Option<&CompiledField> {
        self.codec()?.iter().find(|f| f.name == name)
    }

    /// Default values for every declared field, in wire order.
    pub(crate) fn blank_record(&self) -> Record {
        default_record(self.defaults)
    }

    pub(crate) fn empty_body(&self) -> NodeKind {
        match &self.layout {
            Layout::Container => NodeKind::Container(Vec::new()),
            Layout::Fields(_) => NodeKind::Fields(self.blank_record()),
            Layout::Opaque => NodeKind::Opaque(Vec::new()),
        }
    }
}

/// Collects [`BoxDef`]s and compiles them into a [`Registry`].
#[derive(Debug, Default, Clone)]
pub struct RegistryBuilder {
    defs: Vec<BoxDef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_box(mut self, def: BoxDef) -> Self {
        self.defs.push(def);
        self
    }

    pub fn with_boxes(mut self, defs: &[BoxDef]) -> Self {
        self.defs.extend_from_slice(defs);
        self
    }

    /// Build, logging schema findings through `tracing`.
    pub fn build(self) -> Registry {
        self.build_with_sink(&mut TracingSink)
    }

    /// Build, sending schema findings to `sink`. A later definition with the
    /// same key replaces an earlier one and is reported.
    pub fn build_with_sink(self, sink: &mut dyn DiagnosticSink) -> Registry {
        let mut map = HashMap::with_capacity(self.defs.len());
        for def in &self.defs {
            let variant = Arc::new(Variant::compile(def, sink));
            if map.insert(def.key(), variant).is_some() {
                sink.report(Diagnostic {
                    typ: def.typ,
                    field: None,
                    kind: DiagnosticKind::DuplicateVariant,
                });
            }
        }
        Registry { map }
    }
}

/// Immutable map from box key (4CC or UUID) to compiled variant.
#[derive(Debug, Default)]
pub struct Registry {
    map: HashMap<BoxKey, Arc<Variant>>,
}

impl Registry {
    /// Start an empty builder.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, key: &BoxKey) -> Option<&Arc<Variant>> {
        self.map.get(key)
    }

    /// Variant for a header: exact extended-type match for `uuid` boxes,
    /// 4CC match otherwise, opaque passthrough when nothing is registered.
    pub fn resolve(&self, typ: FourCC, uuid: Option<&[u8; 16]>) -> Arc<Variant> {
        let key = match uuid {
            Some(u) if typ == FourCC::UUID => BoxKey::Uuid(*u),
            _ => BoxKey::FourCC(typ),
        };
        match self.map.get(&key) {
            Some(v) => Arc::clone(v),
            None => Arc::new(Variant::opaque(typ, uuid.copied())),
        }
    }

    /// A new box of the given type with default field values.
    pub fn create(&self, typ: &[u8; 4]) -> BoxNode {
        BoxNode::from_variant(self.resolve(FourCC(*typ), None))
    }

    /// A new `uuid` box with the given extended type.
    pub fn create_extended(&self, uuid: [u8; 16]) -> BoxNode {
        BoxNode::from_variant(self.resolve(FourCC::UUID, Some(&uuid)))
    }
}

/// Process-wide registry over [`crate::known_boxes::CATALOG`], built on first use.
pub fn default_registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| RegistryBuilder::new().with_boxes(crate::known_boxes::CATALOG).build())
}
