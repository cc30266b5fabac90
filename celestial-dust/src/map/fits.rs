//! FITS reader and writer for HEALPix NESTED maps.
//!
//! Two layouts are understood:
//!
//! 1. **Primary image**: `BITPIX` −32 or −64, the pixel values stored as a
//!    flat image whose axis lengths multiply to `12·nside²`.
//! 2. **Binary table**, the standard HEALPix layout: the first `BINTABLE`
//!    extension, one `E` or `D` column (optionally vectored, e.g. `1024E`),
//!    rows concatenated in order.
//!
//! The file is memory-mapped and samples are decoded from big-endian in a
//! single pass. `ORDERING` must be `NESTED` when present; `NSIDE`, when
//! present, must agree with the pixel count.

use super::{ExtinctionMap, MapData};
use crate::errors::{DustError, DustResult};
use crate::healpix::Nside;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Selects the data to read from a FITS map file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MapSelector {
    /// Primary image if it holds data, otherwise column 1 of the first
    /// binary table.
    #[default]
    Auto,
    /// Column of the first binary table, matched on `TTYPEn` ignoring case.
    Column(String),
}

/// Read a NESTED full-sky map from a FITS file, choosing the layout
/// automatically.
pub fn read_fits_map(path: impl AsRef<Path>) -> DustResult<ExtinctionMap> {
    read_fits_map_with(path, &MapSelector::Auto)
}

/// Read a NESTED full-sky map from a FITS file.
///
/// # Errors
/// [`DustError::Io`] if the file cannot be opened or mapped,
/// [`DustError::MapFormat`] for anything that is not a well-formed NESTED
/// float map.
pub fn read_fits_map_with(
    path: impl AsRef<Path>,
    selector: &MapSelector,
) -> DustResult<ExtinctionMap> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };

    let map = parse_fits_map(&mmap, selector)?;
    tracing::info!(path = %path.display(), "loaded {}", map);
    Ok(map)
}

/// Parse a map from the bytes of a FITS file.
pub fn parse_fits_map(bytes: &[u8], selector: &MapSelector) -> DustResult<ExtinctionMap> {
    let hdus = scan_hdus(bytes)?;
    let primary = &hdus[0];

    let (hdu, data) = match selector {
        MapSelector::Auto if primary.data_len > 0 => (primary, read_image(bytes, primary)?),
        MapSelector::Auto => {
            let table = first_bintable(&hdus)?;
            (table, read_table_column(bytes, table, ColumnRef::Index(1))?)
        }
        MapSelector::Column(name) => {
            let table = first_bintable(&hdus)?;
            (table, read_table_column(bytes, table, ColumnRef::Name(name.as_str()))?)
        }
    };

    let nside = Nside::from_npix(data.len() as u64)?;
    check_healpix_keywords(&hdu.header, &primary.header, nside)?;
    ExtinctionMap::new(nside, data)
}

/// Write a map as a primary image with HEALPix keywords.
pub fn write_fits_map(path: impl AsRef<Path>, map: &ExtinctionMap) -> DustResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_fits_map_to(&mut writer, map)?;
    writer.flush()?;
    Ok(())
}

pub fn write_fits_map_to<W: Write>(writer: &mut W, map: &ExtinctionMap) -> DustResult<()> {
    let bitpix = match map.data() {
        MapData::F32(_) => -32,
        MapData::F64(_) => -64,
    };
    let cards = [
        format_card("SIMPLE", &CardValue::Logical(true)),
        format_card("BITPIX", &CardValue::Integer(bitpix)),
        format_card("NAXIS", &CardValue::Integer(1)),
        format_card("NAXIS1", &CardValue::Integer(map.len() as i64)),
        format_card("PIXTYPE", &CardValue::Text("HEALPIX".to_string())),
        format_card("ORDERING", &CardValue::Text("NESTED".to_string())),
        format_card("NSIDE", &CardValue::Integer(map.nside().get() as i64)),
        format_card("COORDSYS", &CardValue::Text("G".to_string())),
    ];
    write_header(writer, &cards)?;

    let written = match map.data() {
        MapData::F32(values) => {
            for &v in values {
                writer.write_f32::<BigEndian>(v)?;
            }
            values.len() * 4
        }
        MapData::F64(values) => {
            for &v in values {
                writer.write_f64::<BigEndian>(v)?;
            }
            values.len() * 8
        }
    };
    writer.write_all(&vec![0u8; padding(written)])?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum CardValue {
    Logical(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Default)]
struct Header {
    cards: Vec<(String, CardValue)>,
}

impl Header {
    fn get(&self, keyword: &str) -> Option<&CardValue> {
        self.cards
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, v)| v)
    }

    fn integer(&self, keyword: &str) -> Option<i64> {
        match self.get(keyword)? {
            CardValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    fn require_integer(&self, keyword: &str) -> DustResult<i64> {
        self.integer(keyword).ok_or_else(|| {
            DustError::map_format(format!("missing or non-integer keyword {}", keyword))
        })
    }

    fn real(&self, keyword: &str) -> Option<f64> {
        match self.get(keyword)? {
            CardValue::Real(r) => Some(*r),
            CardValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    fn text(&self, keyword: &str) -> Option<&str> {
        match self.get(keyword)? {
            CardValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Hdu {
    header: Header,
    data_start: usize,
    data_len: usize,
}

fn scan_hdus(bytes: &[u8]) -> DustResult<Vec<Hdu>> {
    if bytes.len() < BLOCK_SIZE || !bytes.starts_with(b"SIMPLE  =") {
        return Err(DustError::map_format("not a FITS file (no SIMPLE card)"));
    }

    let mut hdus = Vec::new();
    let mut offset = 0;
    while offset + BLOCK_SIZE <= bytes.len() {
        // Anything after the last HDU that is not an extension is padding.
        if offset > 0 && !bytes[offset..].starts_with(b"XTENSION=") {
            tracing::debug!(offset, "ignoring trailing bytes after last HDU");
            break;
        }
        let (header, data_start) = parse_header(bytes, offset)?;
        let data_len = data_size(&header)?;
        let data_end = data_start
            .checked_add(data_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                DustError::map_format(format!(
                    "HDU {} data runs past end of file ({} bytes)",
                    hdus.len(),
                    bytes.len()
                ))
            })?;
        hdus.push(Hdu {
            header,
            data_start,
            data_len,
        });
        offset = data_end + padding(data_len);
    }
    Ok(hdus)
}

/// Parses one header starting at `start`; returns it with the offset of the
/// data that follows.
fn parse_header(bytes: &[u8], start: usize) -> DustResult<(Header, usize)> {
    let mut header = Header::default();
    let mut block = start;
    while block + BLOCK_SIZE <= bytes.len() {
        for card in bytes[block..block + BLOCK_SIZE].chunks_exact(CARD_SIZE) {
            let keyword = String::from_utf8_lossy(&card[..8]).trim_end().to_string();
            if keyword == "END" {
                return Ok((header, block + BLOCK_SIZE));
            }
            if &card[8..10] != b"= " {
                continue;
            }
            let raw = String::from_utf8_lossy(&card[10..]);
            if let Some(value) = parse_card_value(&raw) {
                header.cards.push((keyword, value));
            }
        }
        block += BLOCK_SIZE;
    }
    Err(DustError::map_format(format!(
        "header at byte {} has no END card",
        start
    )))
}

fn parse_card_value(raw: &str) -> Option<CardValue> {
    let raw = raw.trim_start();
    if let Some(rest) = raw.strip_prefix('\'') {
        let mut text = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    text.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                text.push(c);
            }
        }
        return Some(CardValue::Text(text.trim_end().to_string()));
    }

    let token = raw.split('/').next()?.trim();
    match token {
        "" => None,
        "T" => Some(CardValue::Logical(true)),
        "F" => Some(CardValue::Logical(false)),
        _ => token
            .parse::<i64>()
            .map(CardValue::Integer)
            .or_else(|_| token.replace(['D', 'd'], "E").parse::<f64>().map(CardValue::Real))
            .ok(),
    }
}

fn data_size(header: &Header) -> DustResult<usize> {
    let naxis = header.integer("NAXIS").unwrap_or(0);
    if naxis <= 0 {
        return Ok(0);
    }
    let bitpix = header.require_integer("BITPIX")?;
    let mut elements: usize = 1;
    for axis in 1..=naxis {
        let len = header.require_integer(&format!("NAXIS{}", axis))?;
        let len = usize::try_from(len)
            .map_err(|_| DustError::map_format(format!("negative NAXIS{}", axis)))?;
        elements = elements
            .checked_mul(len)
            .ok_or_else(|| DustError::map_format("data size overflows"))?;
    }
    let pcount = header.integer("PCOUNT").unwrap_or(0).max(0) as usize;
    let gcount = header.integer("GCOUNT").unwrap_or(1).max(1) as usize;
    let width = bitpix.unsigned_abs() as usize / 8;
    elements
        .checked_add(pcount)
        .and_then(|n| n.checked_mul(gcount))
        .and_then(|n| n.checked_mul(width))
        .ok_or_else(|| DustError::map_format("data size overflows"))
}

fn padding(len: usize) -> usize {
    (BLOCK_SIZE - len % BLOCK_SIZE) % BLOCK_SIZE
}

fn first_bintable(hdus: &[Hdu]) -> DustResult<&Hdu> {
    hdus.iter()
        .skip(1)
        .find(|h| h.header.text("XTENSION") == Some("BINTABLE"))
        .ok_or_else(|| DustError::map_format("no image data and no BINTABLE extension"))
}

fn read_image(bytes: &[u8], hdu: &Hdu) -> DustResult<MapData> {
    let header = &hdu.header;
    let src = &bytes[hdu.data_start..hdu.data_start + hdu.data_len];
    let bscale = header.real("BSCALE").unwrap_or(1.0);
    let bzero = header.real("BZERO").unwrap_or(0.0);

    let data = match header.require_integer("BITPIX")? {
        -32 => {
            let mut values = vec![0f32; src.len() / 4];
            BigEndian::read_f32_into(src, &mut values);
            MapData::F32(values)
        }
        -64 => {
            let mut values = vec![0f64; src.len() / 8];
            BigEndian::read_f64_into(src, &mut values);
            MapData::F64(values)
        }
        other => {
            return Err(DustError::map_format(format!(
                "unsupported image BITPIX {}; expected -32 or -64",
                other
            )))
        }
    };
    Ok(apply_scaling(data, bscale, bzero))
}

enum ColumnRef<'a> {
    Index(usize),
    Name(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnLayout {
    offset: usize,
    repeat: usize,
    code: char,
}

fn read_table_column(bytes: &[u8], hdu: &Hdu, column: ColumnRef<'_>) -> DustResult<MapData> {
    let header = &hdu.header;
    let bitpix = header.require_integer("BITPIX")?;
    if bitpix != 8 {
        return Err(DustError::map_format(format!(
            "BINTABLE BITPIX is {}; expected 8",
            bitpix
        )));
    }
    let row_width = header.require_integer("NAXIS1")? as usize;
    let rows = header.require_integer("NAXIS2")? as usize;
    let index = resolve_column(header, &column)?;
    let layout = column_layout(header, index)?;

    let elem_width = match layout.code {
        'E' => 4,
        'D' => 8,
        other => {
            return Err(DustError::map_format(format!(
                "column {} has type {}; expected E or D",
                index, other
            )))
        }
    };
    if layout.repeat == 0 {
        return Err(DustError::map_format(format!("column {} is empty", index)));
    }
    let field_width = layout.repeat * elem_width;
    if layout.offset + field_width > row_width {
        return Err(DustError::map_format(format!(
            "column {} extends past row width {}",
            index, row_width
        )));
    }

    let table_len = row_width
        .checked_mul(rows)
        .filter(|&len| len <= hdu.data_len)
        .ok_or_else(|| {
            DustError::map_format(format!(
                "table of {} rows x {} bytes exceeds its {} byte data unit",
                rows, row_width, hdu.data_len
            ))
        })?;
    let table = &bytes[hdu.data_start..hdu.data_start + table_len];
    let fields = table
        .chunks_exact(row_width)
        .map(|row| &row[layout.offset..layout.offset + field_width]);
    let count = rows * layout.repeat;

    let data = if elem_width == 4 {
        let mut values = vec![0f32; count];
        for (field, out) in fields.zip(values.chunks_exact_mut(layout.repeat)) {
            BigEndian::read_f32_into(field, out);
        }
        MapData::F32(values)
    } else {
        let mut values = vec![0f64; count];
        for (field, out) in fields.zip(values.chunks_exact_mut(layout.repeat)) {
            BigEndian::read_f64_into(field, out);
        }
        MapData::F64(values)
    };

    let tscale = header.real(&format!("TSCAL{}", index)).unwrap_or(1.0);
    let tzero = header.real(&format!("TZERO{}", index)).unwrap_or(0.0);
    Ok(apply_scaling(data, tscale, tzero))
}

/// 1-based column index.
fn resolve_column(header: &Header, column: &ColumnRef<'_>) -> DustResult<usize> {
    let fields = header.require_integer("TFIELDS")?.max(0) as usize;
    match *column {
        ColumnRef::Index(i) if (1..=fields).contains(&i) => Ok(i),
        ColumnRef::Index(i) => Err(DustError::map_format(format!(
            "table has {} columns, column {} requested",
            fields, i
        ))),
        ColumnRef::Name(name) => (1..=fields)
            .find(|i| {
                header
                    .text(&format!("TTYPE{}", i))
                    .is_some_and(|t| t.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| DustError::map_format(format!("no column named {}", name))),
    }
}

fn column_layout(header: &Header, index: usize) -> DustResult<ColumnLayout> {
    let mut offset = 0;
    for i in 1..index {
        offset += field_width(&tform(header, i)?)?;
    }
    let (repeat, code) = parse_tform(&tform(header, index)?)?;
    Ok(ColumnLayout {
        offset,
        repeat,
        code,
    })
}

fn tform(header: &Header, index: usize) -> DustResult<String> {
    header
        .text(&format!("TFORM{}", index))
        .map(str::to_string)
        .ok_or_else(|| DustError::map_format(format!("missing TFORM{}", index)))
}

/// Splits a TFORM such as `1024E` into repeat count and type code.
fn parse_tform(tform: &str) -> DustResult<(usize, char)> {
    let tform = tform.trim();
    let digits = tform.chars().take_while(|c| c.is_ascii_digit()).count();
    let repeat = if digits == 0 {
        1
    } else {
        tform[..digits]
            .parse::<usize>()
            .map_err(|_| DustError::map_format(format!("bad TFORM {}", tform)))?
    };
    let code = tform[digits..]
        .chars()
        .next()
        .ok_or_else(|| DustError::map_format(format!("bad TFORM {}", tform)))?;
    Ok((repeat, code.to_ascii_uppercase()))
}

/// Bytes a column occupies in one row.
fn field_width(tform: &str) -> DustResult<usize> {
    let (repeat, code) = parse_tform(tform)?;
    let width = match code {
        'X' => return Ok(repeat.div_ceil(8)),
        'L' | 'B' | 'A' => 1,
        'I' => 2,
        'J' | 'E' => 4,
        'K' | 'D' | 'C' | 'P' => 8,
        'M' | 'Q' => 16,
        other => {
            return Err(DustError::map_format(format!(
                "unknown TFORM type {}",
                other
            )))
        }
    };
    Ok(repeat * width)
}

fn apply_scaling(data: MapData, scale: f64, zero: f64) -> MapData {
    if scale == 1.0 && zero == 0.0 {
        return data;
    }
    let scaled = match data {
        MapData::F32(v) => v.into_iter().map(|x| x as f64 * scale + zero).collect(),
        MapData::F64(v) => v.into_iter().map(|x| x * scale + zero).collect(),
    };
    MapData::F64(scaled)
}

fn check_healpix_keywords(header: &Header, primary: &Header, nside: Nside) -> DustResult<()> {
    let lookup = |key: &str| header.get(key).or_else(|| primary.get(key));

    match lookup("ORDERING") {
        Some(CardValue::Text(ordering)) if ordering.eq_ignore_ascii_case("NESTED") => {}
        Some(CardValue::Text(ordering)) => {
            return Err(DustError::map_format(format!(
                "ORDERING is {}; only NESTED maps are supported",
                ordering
            )))
        }
        _ => tracing::warn!("map has no ORDERING keyword; assuming NESTED"),
    }

    if let Some(CardValue::Integer(declared)) = lookup("NSIDE") {
        if *declared as u64 != nside.get() {
            return Err(DustError::map_format(format!(
                "NSIDE keyword {} disagrees with pixel count (nside {})",
                declared, nside
            )));
        }
    }
    Ok(())
}

fn format_card(keyword: &str, value: &CardValue) -> String {
    let value = match value {
        CardValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        CardValue::Integer(i) => format!("{:>20}", i),
        CardValue::Real(r) => format!("{:>20}", format!("{:E}", r)),
        CardValue::Text(s) => format!("'{:<8}'", s.replace('\'', "''")),
    };
    let card = format!("{:<8}= {}", keyword, value);
    format!("{:<80.80}", card)
}

fn write_header<W: Write>(writer: &mut W, cards: &[String]) -> DustResult<()> {
    let mut written = 0;
    for card in cards {
        writer.write_all(card.as_bytes())?;
        written += CARD_SIZE;
    }
    writer.write_all(format!("{:<80}", "END").as_bytes())?;
    written += CARD_SIZE;
    writer.write_all(&vec![b' '; padding(written)])?;
    Ok(())
}
