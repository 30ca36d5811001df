use std::io::Read;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use flate2::read::{DeflateDecoder, GzDecoder};
use thiserror::Error;

/// Flip flags as stored in `DecodedLayer::flip_flags`, one byte per cell.
pub const FLIP_HORIZONTAL: u8 = 0b001;
pub const FLIP_VERTICAL: u8 = 0b010;
pub const FLIP_DIAGONAL: u8 = 0b100;

// Top three bits of a stored tile word carry orientation, not identity.
const GID_FLIP_HORIZONTAL: u32 = 0x8000_0000;
const GID_FLIP_VERTICAL: u32 = 0x4000_0000;
const GID_FLIP_DIAGONAL: u32 = 0x2000_0000;
const GID_FLAG_MASK: u32 = GID_FLIP_HORIZONTAL | GID_FLIP_VERTICAL | GID_FLIP_DIAGONAL;

const ZLIB_HEADER_LEN: usize = 2;
const ZLIB_TRAILER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEncoding {
    Csv,
    Base64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerCompression {
    None,
    Gzip,
    Zlib,
}

/// A layer payload with orientation bits separated from tile identity.
/// `tiles` and `flip_flags` are index-parallel and always the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLayer {
    pub tiles: Vec<u32>,
    pub flip_flags: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TileDataError {
    #[error("invalid tile token {token:?}: {source}")]
    InvalidToken {
        token: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid base64 tile payload: {source}")]
    Base64 {
        #[source]
        source: base64::DecodeError,
    },
    #[error("failed to decompress tile payload: {source}")]
    Decompress {
        #[source]
        source: std::io::Error,
    },
    #[error("zlib tile payload is {len} bytes, shorter than header plus checksum")]
    ZlibTooShort { len: usize },
    #[error("decoded tile payload length {len} is not a multiple of 4")]
    Misaligned { len: usize },
}

/// Decodes a layer's `<data>` text into tile ids plus per-cell flip flags.
pub fn decode_layer_data(
    encoding: LayerEncoding,
    compression: LayerCompression,
    raw: &str,
) -> Result<DecodedLayer, TileDataError> {
    let words = match encoding {
        LayerEncoding::Csv => parse_csv_tokens(raw)?,
        LayerEncoding::Base64 => {
            let bytes = decode_base64_payload(raw)?;
            let bytes = decompress_payload(compression, bytes)?;
            words_from_le_bytes(&bytes)?
        }
    };

    let mut tiles = Vec::with_capacity(words.len());
    let mut flip_flags = Vec::with_capacity(words.len());
    for word in words {
        let (tile, flags) = split_flip_flags(word);
        tiles.push(tile);
        flip_flags.push(flags);
    }

    Ok(DecodedLayer { tiles, flip_flags })
}

/// Re-encodes a decoded layer as CSV text, restoring flip bits into each
/// token. Rows are joined with `",\n"` so the row structure survives a
/// rewrite of the document text.
pub fn encode_csv_layer(layer: &DecodedLayer, row_width: u32) -> String {
    let merged: Vec<u32> = layer
        .tiles
        .iter()
        .zip(&layer.flip_flags)
        .map(|(&tile, &flags)| merge_flip_flags(tile, flags))
        .collect();
    format_csv_rows(&merged, row_width)
}

pub(crate) fn format_csv_rows(values: &[u32], row_width: u32) -> String {
    let width = row_width.max(1) as usize;
    values
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join(",\n")
}

/// Parses CSV tokens into raw tile words, flip bits still attached.
/// Blank tokens read as 0 so sparse exports survive; anything else
/// non-numeric is an error naming the offending token.
pub(crate) fn parse_csv_tokens(raw: &str) -> Result<Vec<u32>, TileDataError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut values = Vec::new();
    for token in raw.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            values.push(0);
            continue;
        }
        let value = trimmed
            .parse::<u32>()
            .map_err(|source| TileDataError::InvalidToken {
                token: trimmed.to_string(),
                source,
            })?;
        values.push(value);
    }
    Ok(values)
}

fn decode_base64_payload(raw: &str) -> Result<Vec<u8>, TileDataError> {
    // Map exporters wrap the payload in indented newlines; the strict
    // engine rejects embedded whitespace, so strip it first.
    let cleaned: Vec<u8> = raw
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect();
    BASE64_STANDARD
        .decode(&cleaned)
        .map_err(|source| TileDataError::Base64 { source })
}

fn decompress_payload(
    compression: LayerCompression,
    bytes: Vec<u8>,
) -> Result<Vec<u8>, TileDataError> {
    match compression {
        LayerCompression::None => Ok(bytes),
        LayerCompression::Gzip => {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|source| TileDataError::Decompress { source })?;
            Ok(out)
        }
        LayerCompression::Zlib => {
            // The stream is a 2-byte zlib header, a raw DEFLATE body and a
            // 4-byte Adler-32 trailer. Only the body goes to the decoder.
            if bytes.len() < ZLIB_HEADER_LEN + ZLIB_TRAILER_LEN {
                return Err(TileDataError::ZlibTooShort { len: bytes.len() });
            }
            let body = &bytes[ZLIB_HEADER_LEN..bytes.len() - ZLIB_TRAILER_LEN];
            let mut decoder = DeflateDecoder::new(body);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|source| TileDataError::Decompress { source })?;
            Ok(out)
        }
    }
}

fn words_from_le_bytes(bytes: &[u8]) -> Result<Vec<u32>, TileDataError> {
    if bytes.len() % 4 != 0 {
        return Err(TileDataError::Misaligned { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

fn split_flip_flags(word: u32) -> (u32, u8) {
    let mut flags = 0u8;
    if word & GID_FLIP_HORIZONTAL != 0 {
        flags |= FLIP_HORIZONTAL;
    }
    if word & GID_FLIP_VERTICAL != 0 {
        flags |= FLIP_VERTICAL;
    }
    if word & GID_FLIP_DIAGONAL != 0 {
        flags |= FLIP_DIAGONAL;
    }
    (word & !GID_FLAG_MASK, flags)
}

fn merge_flip_flags(tile: u32, flags: u8) -> u32 {
    let mut word = tile;
    if flags & FLIP_HORIZONTAL != 0 {
        word |= GID_FLIP_HORIZONTAL;
    }
    if flags & FLIP_VERTICAL != 0 {
        word |= GID_FLIP_VERTICAL;
    }
    if flags & FLIP_DIAGONAL != 0 {
        word |= GID_FLIP_DIAGONAL;
    }
    word
}
