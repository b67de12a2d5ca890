use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use attitude::{interpret, AngleOffsets, FrameDecoder, SerialReading};

/// Decode a raw serial IMU capture into CSV
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Raw byte dump from the serial port
    dump_file: PathBuf,

    /// Output CSV path
    output_csv: PathBuf,

    /// Heading offset in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    heading_offset: f64,

    /// Roll offset in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    roll_offset: f64,

    /// Pitch offset in degrees
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pitch_offset: f64,
}

enum Record {
    Reading { address: u8, reading: SerialReading },
    Other { address: u8, bytes: Vec<u8> },
    Truncated { address: u8, bytes: Vec<u8> },
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut data = Vec::new();
    File::open(&args.dump_file)
        .and_then(|mut f| f.read_to_end(&mut data))
        .with_context(|| format!("Failed to read {}", args.dump_file.display()))?;

    println!("Read {} bytes from {}", data.len(), args.dump_file.display());

    let offsets = AngleOffsets {
        roll_deg: args.roll_offset,
        pitch_deg: args.pitch_offset,
        heading_deg: args.heading_offset,
    };

    let mut decoder = FrameDecoder::new();
    let mut records = Vec::new();
    decoder.feed_all(&data, |payload| {
        let address = payload.address();
        let record = match interpret(&payload, &offsets) {
            Ok(Some(reading)) => Record::Reading { address, reading },
            Ok(None) => Record::Other {
                address,
                bytes: payload.to_vec(),
            },
            Err(_) => Record::Truncated {
                address,
                bytes: payload.to_vec(),
            },
        };
        records.push(record);
    });

    let stats = decoder.stats();
    let readings = records
        .iter()
        .filter(|r| matches!(r, Record::Reading { .. }))
        .count();
    println!(
        "Decoded {} frames ({readings} sensor reports), {} framing errors",
        stats.frames_decoded, stats.framing_errors
    );

    let file = File::create(&args.output_csv)
        .with_context(|| format!("Failed to create {}", args.output_csv.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(out, "type,address,timestamp_ms,heading_deg,roll_deg,pitch_deg,payload_hex")?;
    for record in &records {
        match record {
            Record::Reading { address, reading } => writeln!(
                out,
                "report,{address:#04x},{},{},{},{},",
                reading.timestamp_ms,
                fmt_opt(reading.heading_deg),
                fmt_opt(reading.roll_deg),
                fmt_opt(reading.pitch_deg),
            )?,
            Record::Other { address, bytes } => {
                writeln!(out, "other,{address:#04x},,,,,{}", hex(bytes))?
            }
            Record::Truncated { address, bytes } => {
                writeln!(out, "truncated,{address:#04x},,,,,{}", hex(bytes))?
            }
        }
    }
    out.flush()?;

    println!("Wrote {}", args.output_csv.display());
    Ok(())
}
