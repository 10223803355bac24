use isobox::{Value, default_registry};
use std::env;

// Builds a minimal movie fragment (moof with one traf) from scratch and writes
// it to the file given on the command line.
fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <out-file>", args[0]);
        std::process::exit(1);
    }

    let reg = default_registry();

    let mut mfhd = reg.create(b"mfhd");
    mfhd.set("sequence_number", 1u32)?;

    let mut tfhd = reg.create(b"tfhd");
    tfhd.set_flags(0x02_0000 | 0x08)?; // default-base-is-moof, default duration
    tfhd.set("track_id", 1u32)?;
    tfhd.set("default_sample_duration", 1001u32)?;

    let mut tfdt = reg.create(b"tfdt");
    tfdt.set_version(1);
    tfdt.set("base_media_decode_time", 90_000u64)?;

    let sizes = [4_000u32, 1_200, 1_150];
    let mut trun = reg.create(b"trun");
    trun.set_flags(0x200)?;
    trun.set("sample_count", sizes.len() as u32)?;
    let mut samples = Vec::new();
    for size in sizes {
        let mut sample = trun.new_entry("samples")?;
        sample.set("sample_size", size);
        samples.push(Value::Record(sample));
    }
    trun.set("samples", samples)?;

    let mut traf = reg.create(b"traf");
    for child in [tfhd, tfdt, trun] {
        traf.push_child(child).map_err(|_| anyhow::anyhow!("traf is not a container"))?;
    }
    let mut moof = reg.create(b"moof");
    moof.push_child(mfhd).map_err(|_| anyhow::anyhow!("moof is not a container"))?;
    moof.push_child(traf).map_err(|_| anyhow::anyhow!("moof is not a container"))?;

    let bytes = moof.to_bytes()?;
    std::fs::write(&args[1], &bytes)?;
    println!("wrote {} bytes", bytes.len());

    Ok(())
}
