//! Minimal baseline TIFF writer.
//!
//! Big-endian ("MM"), one uncompressed strip of 8-bit RGB, no alpha. The
//! layout is fixed: header, a ten entry IFD, the three bits-per-sample
//! values, then the pixel data at byte 140.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

const IFD_OFFSET: u32 = 8;
const ENTRY_COUNT: u16 = 10;
const BITS_OFFSET: u32 = IFD_OFFSET + 2 + ENTRY_COUNT as u32 * 12 + 4;
const DATA_OFFSET: u32 = BITS_OFFSET + 6;

const SHORT: u16 = 3;
const LONG: u16 = 4;

/// Write `rgb` (row-major, 3 bytes per pixel) as a TIFF image.
pub fn write_rgb<W: Write>(w: &mut W, width: u32, height: u32, rgb: &[u8]) -> io::Result<()> {
    let byte_count = width as u64 * height as u64 * 3;
    if rgb.len() as u64 != byte_count {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "expected {} bytes for {}x{} RGB, got {}",
                byte_count,
                width,
                height,
                rgb.len()
            ),
        ));
    }
    let byte_count = u32::try_from(byte_count)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "image too large for TIFF"))?;

    // Header
    w.write_all(b"MM")?;
    w.write_all(&42u16.to_be_bytes())?;
    w.write_all(&IFD_OFFSET.to_be_bytes())?;

    // IFD, entries sorted by tag
    w.write_all(&ENTRY_COUNT.to_be_bytes())?;
    entry(w, 256, LONG, 1, width)?; // ImageWidth
    entry(w, 257, LONG, 1, height)?; // ImageLength
    entry(w, 258, SHORT, 3, BITS_OFFSET)?; // BitsPerSample
    short_entry(w, 259, 1)?; // Compression: none
    short_entry(w, 262, 2)?; // PhotometricInterpretation: RGB
    entry(w, 273, LONG, 1, DATA_OFFSET)?; // StripOffsets
    short_entry(w, 277, 3)?; // SamplesPerPixel
    entry(w, 278, LONG, 1, height)?; // RowsPerStrip
    entry(w, 279, LONG, 1, byte_count)?; // StripByteCounts
    short_entry(w, 284, 1)?; // PlanarConfiguration: chunky
    w.write_all(&0u32.to_be_bytes())?; // no next IFD

    for _ in 0..3 {
        w.write_all(&8u16.to_be_bytes())?;
    }

    w.write_all(rgb)
}

/// Write a TIFF file to `path`.
pub fn save_rgb(path: impl AsRef<Path>, width: u32, height: u32, rgb: &[u8]) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    write_rgb(&mut out, width, height, rgb)?;
    out.flush()?;
    log::info!("Saved {}x{} TIFF to {}", width, height, path.as_ref().display());
    Ok(())
}

fn entry<W: Write>(w: &mut W, tag: u16, kind: u16, count: u32, value: u32) -> io::Result<()> {
    w.write_all(&tag.to_be_bytes())?;
    w.write_all(&kind.to_be_bytes())?;
    w.write_all(&count.to_be_bytes())?;
    w.write_all(&value.to_be_bytes())
}

/// A single SHORT value, left-justified in the value field.
fn short_entry<W: Write>(w: &mut W, tag: u16, value: u16) -> io::Result<()> {
    w.write_all(&tag.to_be_bytes())?;
    w.write_all(&SHORT.to_be_bytes())?;
    w.write_all(&1u32.to_be_bytes())?;
    w.write_all(&value.to_be_bytes())?;
    w.write_all(&[0, 0])
}
