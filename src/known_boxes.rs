//! Built-in box catalogue: common ISO BMFF boxes and their payload layouts.
//!
//! Anything not listed here parses as an opaque payload.

use crate::field::{FieldDescriptor as F, FieldType as T, Primitive};
use crate::registry::BoxDef;

/// Smooth Streaming `TfxdBox` extended type.
pub const TFXD_UUID: [u8; 16] = [
    0x6d, 0x1d, 0x9b, 0x05, 0x42, 0xd5, 0x44, 0xe6, 0x80, 0xe2, 0x14, 0x1d, 0xaf, 0xf7, 0x57, 0xb2,
];

/// Smooth Streaming `TfrfBox` extended type.
pub const TFRF_UUID: [u8; 16] = [
    0xd4, 0x80, 0x7e, 0xf2, 0xca, 0x39, 0x46, 0x95, 0x8e, 0x54, 0x26, 0xcb, 0x9e, 0x46, 0xa7, 0x9f,
];

// ---- file level ----

const FTYP: &[F] = &[
    F::new("major_brand", 0, T::FOURCC),
    F::new("minor_version", 1, T::U32),
    F::new("compatible_brands", 2, T::list(Primitive::FourCC)).remaining_bytes(),
];

const SIDX_REFERENCE: &[F] = &[
    // reference_type:1 | referenced_size:31
    F::new("referenced_size", 0, T::U32),
    F::new("subsegment_duration", 1, T::U32),
    // starts_with_sap:1 | sap_type:3 | sap_delta_time:28
    F::new("sap", 2, T::U32),
];

const SIDX: &[F] = &[
    F::new("reference_id", 0, T::U32),
    F::new("timescale", 1, T::U32),
    F::new("earliest_presentation_time", 2, T::U64).version_sized(),
    F::new("first_offset", 3, T::U64).version_sized(),
    F::new("reserved", 4, T::U16).reserved(2),
    F::new("references", 5, T::entries(SIDX_REFERENCE)).length_prefixed(2),
];

const PRFT: &[F] = &[
    F::new("reference_track_id", 0, T::U32),
    F::new("ntp_timestamp", 1, T::U64),
    F::new("media_time", 2, T::U64).version_sized(),
];

const MFRO: &[F] = &[F::new("mfra_size", 0, T::U32)];

// ---- moov ----

const MVHD: &[F] = &[
    F::new("creation_time", 0, T::U64).version_sized(),
    F::new("modification_time", 1, T::U64).version_sized(),
    F::new("timescale", 2, T::U32),
    F::new("duration", 3, T::U64).version_sized(),
    F::new("rate", 4, T::I32),
    F::new("volume", 5, T::I16),
    F::new("reserved", 6, T::U16).reserved(10),
    F::new("matrix", 7, T::list(Primitive::I32)).presized(9),
    F::new("pre_defined", 8, T::U32).reserved(24),
    F::new("next_track_id", 9, T::U32),
];

const TKHD: &[F] = &[
    F::new("creation_time", 0, T::U64).version_sized(),
    F::new("modification_time", 1, T::U64).version_sized(),
    F::new("track_id", 2, T::U32),
    F::new("reserved1", 3, T::U32).reserved(4),
    F::new("duration", 4, T::U64).version_sized(),
    F::new("reserved2", 5, T::U32).reserved(8),
    F::new("layer", 6, T::I16),
    F::new("alternate_group", 7, T::I16),
    F::new("volume", 8, T::I16),
    F::new("reserved3", 9, T::U16).reserved(2),
    F::new("matrix", 10, T::list(Primitive::I32)).presized(9),
    // 16.16 fixed point
    F::new("width", 11, T::U32),
    F::new("height", 12, T::U32),
];

const ELST_ENTRY: &[F] = &[
    F::new("segment_duration", 0, T::U64).version_sized(),
    F::new("media_time", 1, T::I64).version_sized(),
    F::new("media_rate_integer", 2, T::I16),
    F::new("media_rate_fraction", 3, T::I16),
];

const ELST: &[F] = &[F::new("entries", 0, T::entries(ELST_ENTRY)).length_prefixed(4)];

const MDHD: &[F] = &[
    F::new("creation_time", 0, T::U64).version_sized(),
    F::new("modification_time", 1, T::U64).version_sized(),
    F::new("timescale", 2, T::U32),
    F::new("duration", 3, T::U64).version_sized(),
    // pad:1 | ISO-639-2/T code packed as three 5-bit letters
    F::new("language", 4, T::U16),
    F::new("pre_defined", 5, T::U16).reserved(2),
];

const HDLR: &[F] = &[
    F::new("pre_defined", 0, T::U32).reserved(4),
    F::new("handler_type", 1, T::FOURCC),
    F::new("reserved", 2, T::U32).reserved(12),
    F::new("name", 3, T::Str),
];

const VMHD: &[F] = &[
    F::new("graphics_mode", 0, T::U16),
    F::new("opcolor", 1, T::list(Primitive::U16)).presized(3),
];

const SMHD: &[F] = &[
    F::new("balance", 0, T::I16),
    F::new("reserved", 1, T::U16).reserved(2),
];

// ---- sample tables ----

const STTS_ENTRY: &[F] = &[
    F::new("sample_count", 0, T::U32),
    F::new("sample_delta", 1, T::U32),
];

const STTS: &[F] = &[F::new("entries", 0, T::entries(STTS_ENTRY)).length_prefixed(4)];

const CTTS_ENTRY: &[F] = &[
    F::new("sample_count", 0, T::U32),
    F::new("sample_offset", 1, T::I32),
];

const CTTS: &[F] = &[F::new("entries", 0, T::entries(CTTS_ENTRY)).length_prefixed(4)];

const STSC_ENTRY: &[F] = &[
    F::new("first_chunk", 0, T::U32),
    F::new("samples_per_chunk", 1, T::U32),
    F::new("sample_description_index", 2, T::U32),
];

const STSC: &[F] = &[F::new("entries", 0, T::entries(STSC_ENTRY)).length_prefixed(4)];

const STSS: &[F] = &[F::new("sample_numbers", 0, T::list(Primitive::U32)).length_prefixed(4)];

const STSZ: &[F] = &[
    F::new("sample_size", 0, T::U32),
    F::new("sample_count", 1, T::U32),
    // empty when sample_size is non-zero
    F::new("entry_sizes", 2, T::list(Primitive::U32)).remaining_bytes(),
];

const STCO: &[F] = &[F::new("chunk_offsets", 0, T::list(Primitive::U32)).length_prefixed(4)];

const CO64: &[F] = &[F::new("chunk_offsets", 0, T::list(Primitive::U64)).length_prefixed(4)];

const SDTP: &[F] = &[F::new("sample_dependencies", 0, T::list(Primitive::U8)).remaining_bytes()];

const SAIZ: &[F] = &[
    F::new("aux_info_type", 0, T::FOURCC).when_flag(0x01),
    F::new("aux_info_type_parameter", 1, T::U32).when_flag(0x01),
    F::new("default_sample_info_size", 2, T::U8),
    F::new("sample_count", 3, T::U32),
    // present only when default_sample_info_size is 0
    F::new("sample_info_sizes", 4, T::list(Primitive::U8)).remaining_bytes(),
];

const SAIO_ENTRY: &[F] = &[F::new("offset", 0, T::U64).version_sized()];

const SAIO: &[F] = &[
    F::new("aux_info_type", 0, T::FOURCC).when_flag(0x01),
    F::new("aux_info_type_parameter", 1, T::U32).when_flag(0x01),
    F::new("entry_count", 2, T::U32),
    F::new("offsets", 3, T::entries(SAIO_ENTRY)).count_from("entry_count"),
];

const PASP: &[F] = &[
    F::new("h_spacing", 0, T::U32),
    F::new("v_spacing", 1, T::U32),
];

const BTRT: &[F] = &[
    F::new("buffer_size_db", 0, T::U32),
    F::new("max_bitrate", 1, T::U32),
    F::new("avg_bitrate", 2, T::U32),
];

// ---- fragments ----

const MEHD: &[F] = &[F::new("fragment_duration", 0, T::U64).version_sized()];

const TREX: &[F] = &[
    F::new("track_id", 0, T::U32),
    F::new("default_sample_description_index", 1, T::U32),
    F::new("default_sample_duration", 2, T::U32),
    F::new("default_sample_size", 3, T::U32),
    F::new("default_sample_flags", 4, T::U32),
];

const MFHD: &[F] = &[F::new("sequence_number", 0, T::U32)];

const TFHD: &[F] = &[
    F::new("track_id", 0, T::U32),
    F::new("base_data_offset", 1, T::U64).when_flag(0x01),
    F::new("sample_description_index", 2, T::U32).when_flag(0x02),
    F::new("default_sample_duration", 3, T::U32).when_flag(0x08),
    F::new("default_sample_size", 4, T::U32).when_flag(0x10),
    F::new("default_sample_flags", 5, T::U32).when_flag(0x20),
];

const TFDT: &[F] = &[F::new("base_media_decode_time", 0, T::U64).version_sized()];

const TRUN_SAMPLE: &[F] = &[
    F::new("sample_duration", 0, T::U32).when_flag(0x100),
    F::new("sample_size", 1, T::U32).when_flag(0x200),
    F::new("sample_flags", 2, T::U32).when_flag(0x400),
    F::new("sample_composition_time_offset", 3, T::I32).when_flag(0x800),
];

const TRUN: &[F] = &[
    F::new("sample_count", 0, T::U32),
    F::new("data_offset", 1, T::I32).when_flag(0x01),
    F::new("first_sample_flags", 2, T::U32).when_flag(0x04),
    F::new("samples", 3, T::entries(TRUN_SAMPLE)).count_from("sample_count"),
];

const TFXD: &[F] = &[
    F::new("fragment_absolute_time", 0, T::U64).version_sized(),
    F::new("fragment_duration", 1, T::U64).version_sized(),
];

const TFRF_ENTRY: &[F] = &[
    F::new("fragment_absolute_time", 0, T::U64).version_sized(),
    F::new("fragment_duration", 1, T::U64).version_sized(),
];

const TFRF: &[F] = &[
    F::new("fragment_count", 0, T::U8),
    F::new("entries", 1, T::entries(TFRF_ENTRY)).count_from("fragment_count"),
];

/// Every variant registered by [`crate::registry::default_registry`].
pub static CATALOG: &[BoxDef] = &[
    // containers
    BoxDef::container(b"moov", "Movie Box"),
    BoxDef::container(b"trak", "Track Box"),
    BoxDef::container(b"mdia", "Media Box"),
    BoxDef::container(b"minf", "Media Information Box"),
    BoxDef::container(b"stbl", "Sample Table Box"),
    BoxDef::container(b"edts", "Edit Box"),
    BoxDef::container(b"dinf", "Data Information Box"),
    BoxDef::container(b"mvex", "Movie Extends Box"),
    BoxDef::container(b"moof", "Movie Fragment Box"),
    BoxDef::container(b"traf", "Track Fragment Box"),
    BoxDef::container(b"mfra", "Movie Fragment Random Access Box"),
    BoxDef::container(b"udta", "User Data Box"),
    BoxDef::container(b"sinf", "Protection Scheme Information Box"),
    BoxDef::container(b"schi", "Scheme Information Box"),
    BoxDef::container(b"tref", "Track Reference Box"),
    BoxDef::container(b"meta", "Meta Box").as_full(),
    // opaque payloads
    BoxDef::leaf(b"mdat", "Media Data Box"),
    BoxDef::leaf(b"free", "Free Space Box"),
    BoxDef::leaf(b"skip", "Free Space Box"),
    BoxDef::leaf(b"wide", "Wide Box"),
    // file level
    BoxDef::leaf(b"ftyp", "File Type Box").with_fields(FTYP),
    BoxDef::leaf(b"styp", "Segment Type Box").with_fields(FTYP),
    BoxDef::full(b"sidx", "Segment Index Box").with_fields(SIDX),
    BoxDef::full(b"prft", "Producer Reference Time Box").with_fields(PRFT),
    BoxDef::full(b"mfro", "Movie Fragment Random Access Offset Box").with_fields(MFRO),
    // moov
    BoxDef::full(b"mvhd", "Movie Header Box").with_fields(MVHD),
    BoxDef::full(b"tkhd", "Track Header Box").with_fields(TKHD),
    BoxDef::full(b"elst", "Edit List Box").with_fields(ELST),
    BoxDef::full(b"mdhd", "Media Header Box").with_fields(MDHD),
    BoxDef::full(b"hdlr", "Handler Reference Box").with_fields(HDLR),
    BoxDef::full(b"vmhd", "Video Media Header Box").with_fields(VMHD),
    BoxDef::full(b"smhd", "Sound Media Header Box").with_fields(SMHD),
    BoxDef::full(b"nmhd", "Null Media Header Box"),
    // sample tables
    BoxDef::full(b"stts", "Decoding Time to Sample Box").with_fields(STTS),
    BoxDef::full(b"ctts", "Composition Time to Sample Box").with_fields(CTTS),
    BoxDef::full(b"stsc", "Sample To Chunk Box").with_fields(STSC),
    BoxDef::full(b"stss", "Sync Sample Box").with_fields(STSS),
    BoxDef::full(b"stsz", "Sample Size Box").with_fields(STSZ),
    BoxDef::full(b"stco", "Chunk Offset Box").with_fields(STCO),
    BoxDef::full(b"co64", "Chunk Large Offset Box").with_fields(CO64),
    BoxDef::full(b"sdtp", "Independent and Disposable Samples Box").with_fields(SDTP),
    BoxDef::full(b"saiz", "Sample Auxiliary Information Sizes Box").with_fields(SAIZ),
    BoxDef::full(b"saio", "Sample Auxiliary Information Offsets Box").with_fields(SAIO),
    BoxDef::leaf(b"pasp", "Pixel Aspect Ratio Box").with_fields(PASP),
    BoxDef::leaf(b"btrt", "Bit Rate Box").with_fields(BTRT),
    // fragments
    BoxDef::full(b"mehd", "Movie Extends Header Box").with_fields(MEHD),
    BoxDef::full(b"trex", "Track Extends Box").with_fields(TREX),
    BoxDef::full(b"mfhd", "Movie Fragment Header Box").with_fields(MFHD),
    BoxDef::full(b"tfhd", "Track Fragment Header Box").with_fields(TFHD),
    BoxDef::full(b"tfdt", "Track Fragment Decode Time Box").with_fields(TFDT),
    BoxDef::full(b"trun", "Track Fragment Run Box").with_fields(TRUN),
    BoxDef::extended(TFXD_UUID, "Smooth Streaming Fragment Time Box").as_full().with_fields(TFXD),
    BoxDef::extended(TFRF_UUID, "Smooth Streaming Fragment Reference Box").as_full().with_fields(TFRF),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile_layout;

    #[test]
    fn catalogue_compiles_cleanly() {
        let mut sink = Vec::new();
        for def in CATALOG {
            compile_layout(def.typ, def.full_box, def.container, def.fields, &mut sink);
        }
        assert!(sink.is_empty(), "{sink:?}");
    }

    #[test]
    fn keys_are_unique() {
        let mut keys: Vec<_> = CATALOG.iter().map(|d| d.key().to_string()).collect();
        let n = keys.len();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), n);
    }
}
