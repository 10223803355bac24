use anyhow::{Context, bail};
use clap::{ArgAction, Parser};
use isobox::{
    BoxNode, BoxReader, DEFAULT_MAX_DEPTH, FourCC, NodeKind, Value, api, default_registry,
    util::{hex_dump, read_slice},
    write_boxes,
};
use std::fs::File;
use std::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "ISO BMFF box explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Dump raw payload of this 4CC (e.g. --raw stsd) or uuid:xxxxxxxx...
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Containers nested deeper than this are not descended into
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Print decoded field values
    #[arg(long, alias = "decode", action = ArgAction::SetTrue)]
    fields: bool,

    /// Bytes to show when dumping raw (0 means entire box payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Emit JSON instead of human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Re-serialize the parsed tree and compare it with the file
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let f = File::open(&args.path).with_context(|| format!("opening {}", args.path))?;

    // --verify re-emits every byte, so only then are opaque payloads loaded
    let reader = if args.verify {
        BoxReader::new(BufReader::new(f))
    } else {
        BoxReader::seekable(BufReader::new(f)).with_context(|| format!("seeking in {}", args.path))?
    };
    let mut top = reader
        .boxes(default_registry(), args.max_depth)
        .collect::<isobox::Result<Vec<BoxNode>>>()
        .with_context(|| format!("parsing {}", args.path))?;
    debug!(boxes = top.len(), "parsed top-level boxes");

    if args.verify {
        return verify(&args.path, &mut top);
    }

    let targets: Vec<&BoxNode> = match &args.filter {
        Some(path) => select_by_path(&top, path),
        None => top.iter().collect(),
    };

    // JSON mode: no tree or raw output, to keep stdout machine-readable
    if args.json {
        let json_boxes: Vec<api::Box> = targets.iter().map(|b| api::Box::from_node(b, args.fields)).collect();
        println!("{}", serde_json::to_string_pretty(&json_boxes)?);
        return Ok(());
    }

    for b in &targets {
        print_box(b, 0, args.fields);
    }

    if let Some(sel) = args.raw.as_ref() {
        let mut f = File::open(&args.path)?;
        let mut matches = Vec::new();
        select_boxes(&top, sel, &mut matches);
        for (i, b) in matches.into_iter().enumerate() {
            let off = b.hdr.start + b.header_size();
            let len = b.hdr.size - b.header_size();
            let to_read = if args.bytes == 0 { len } else { len.min(args.bytes as u64) };
            let data = read_slice(&mut f, off, to_read)?;
            println!("\n== Dump {} ({}) payload: offset={:#x}, len={} ==", i, display_type(b), off, to_read);
            print!("{}", hex_dump(&data, off));
        }
    }

    Ok(())
}

fn verify(path: &str, top: &mut [BoxNode]) -> anyhow::Result<()> {
    let original = std::fs::read(path).with_context(|| format!("reading {path}"))?;
    let mut written = Vec::with_capacity(original.len());
    write_boxes(&mut written, top).context("re-serializing")?;

    if written != original {
        let at = written.iter().zip(&original).position(|(a, b)| a != b).unwrap_or(written.len().min(original.len()));
        bail!("round trip differs at byte {at:#x} ({} bytes written, {} in file)", written.len(), original.len());
    }
    info!(bytes = written.len(), "round trip matches");
    println!("ok: {} bytes round-trip unchanged", written.len());
    Ok(())
}

// ---------- Human-readable tree ----------

fn print_box(b: &BoxNode, depth: usize, fields: bool) {
    let indent = "  ".repeat(depth);
    let hdr = &b.hdr;
    let head = format!("{indent}{:>6} {:>10} {}", format!("{:#x}", hdr.start), hdr.size, display_type(b));
    let tail = match b.full {
        Some(full) => format!(" (ver={}, flags=0x{:06x})", full.version(), full.flags()),
        None => String::new(),
    };

    match &b.kind {
        NodeKind::Container(children) => {
            println!("{head}{tail} (container)");
            for c in children {
                print_box(c, depth + 1, fields);
            }
        }
        NodeKind::Fields(record) => {
            println!("{head}{tail} {}", b.full_name());
            if fields {
                for f in record.iter() {
                    println!("{indent}         {} = {}", f.name, show(&f.value));
                }
            }
        }
        NodeKind::Opaque(bytes) => {
            println!("{head}{tail} [{} bytes]", bytes.len());
        }
        NodeKind::Skipped { len, .. } => {
            println!("{head}{tail} [{len} bytes]");
        }
    }
}

fn show(v: &Value) -> String {
    match v {
        Value::List(items) if items.len() > 8 => {
            let head: Vec<String> = items[..8].iter().map(show).collect();
            format!("[{}, ... {} total]", head.join(", "), items.len())
        }
        Value::List(items) => format!("[{}]", items.iter().map(show).collect::<Vec<_>>().join(", ")),
        Value::Record(r) => {
            let parts: Vec<String> = r.iter().map(|f| format!("{}: {}", f.name, show(&f.value))).collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Str(s) => format!("{s:?}"),
        Value::FourCC(cc) => format!("'{cc}'"),
        Value::Guid(g) => hex::encode(g),
        other => other.as_int().map(|i| i.to_string()).unwrap_or_default(),
    }
}

fn display_type(b: &BoxNode) -> String {
    match &b.hdr.uuid {
        Some(u) => format!("uuid:{}", hex::encode(u)),
        None => b.hdr.typ.to_string(),
    }
}

// ---------- Selection ----------

/// Every box (at any depth) whose type or `uuid:<hex>` matches `sel`.
fn select_boxes<'a>(boxes: &'a [BoxNode], sel: &str, out: &mut Vec<&'a BoxNode>) {
    for b in boxes {
        let hit = match sel.strip_prefix("uuid:") {
            Some(hex) => b.hdr.uuid.is_some_and(|u| hex::encode(u).eq_ignore_ascii_case(hex)),
            None => b.hdr.typ.as_str_lossy() == sel,
        };
        if hit {
            out.push(b);
        }
        select_boxes(b.children(), sel, out);
    }
}

fn select_by_path<'a>(roots: &'a [BoxNode], path: &str) -> Vec<&'a BoxNode> {
    let mut current: Vec<&'a BoxNode> = Vec::new();

    for (depth, seg) in path.split('.').enumerate() {
        let (name, idx) = parse_segment(seg);
        let fourcc = FourCC::from_str(name).unwrap_or(FourCC(*b"????"));

        // candidates are the roots at depth 0, else the children of the current set
        let pools: Vec<&'a [BoxNode]> =
            if depth == 0 { vec![roots] } else { current.iter().map(|b| b.children()).collect() };

        let mut next = Vec::new();
        for pool in pools {
            let mut matches: Vec<&'a BoxNode> = pool.iter().filter(|b| b.hdr.typ == fourcc).collect();
            match idx {
                Some(i) => next.extend(matches.get(i).copied()),
                None => next.append(&mut matches),
            }
        }

        current = next;
        if current.is_empty() {
            break;
        }
    }

    current
}

/// `trak[1]` -> ("trak", Some(1)); `mdia` -> ("mdia", None)
fn parse_segment(seg: &str) -> (&str, Option<usize>) {
    if let Some(open) = seg.find('[') {
        if let Some(close) = seg[open..].find(']') {
            let idx = seg[open + 1..open + close].parse().ok();
            return (&seg[..open], idx);
        }
    }
    (seg, None)
}
