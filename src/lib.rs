//! Schema-driven reader and writer for ISO base media file format boxes.
//!
//! Box payloads are described by static field tables
//! ([`field::FieldDescriptor`]) that are validated and compiled once when a
//! [`Registry`] is built. Parsing produces an owned [`BoxNode`] tree that can
//! be edited and written back byte-for-byte.
//!
//! ```
//! use isobox::{BoxReader, BoxNode, DEFAULT_MAX_DEPTH, default_registry};
//! use std::io::Cursor;
//!
//! let data = [0, 0, 0, 16, b'm', b'f', b'h', b'd', 0, 0, 0, 0, 0, 0, 0, 3];
//! let mut r = BoxReader::new(Cursor::new(&data[..]));
//! let mut mfhd = BoxNode::parse(&mut r, default_registry(), DEFAULT_MAX_DEPTH)?;
//! assert_eq!(mfhd.get("sequence_number").and_then(|v| v.as_u64()), Some(3));
//!
//! mfhd.set("sequence_number", 4u32)?;
//! assert_eq!(mfhd.to_bytes()?[15], 4);
//! # Ok::<(), isobox::Error>(())
//! ```

pub mod api;
pub mod boxes;
pub mod codec;
pub mod error;
pub mod field;
pub mod known_boxes;
pub mod parser;
pub mod primitive;
pub mod registry;
pub mod schema;
pub mod util;
pub mod value;
pub mod writer;

pub use api::{get_boxes, hex_range};
pub use boxes::{BoxHeader, BoxKey, BoxNode, FourCC, FullBoxHeader, NodeKind};
pub use error::{Error, Result};
pub use parser::{BoxIter, BoxReader, DEFAULT_MAX_DEPTH, parse_children, read_box_header, read_boxes};
pub use registry::{BoxDef, Registry, RegistryBuilder, Variant, default_registry};
pub use schema::{Diagnostic, DiagnosticKind, DiagnosticSink};
pub use value::{Field, Record, Value};
pub use writer::{write_box_header, write_boxes};
