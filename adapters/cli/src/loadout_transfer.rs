#![allow(clippy::missing_errors_doc)]

use std::{error::Error, fmt};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use darknet_defence_core::{DefenseKind, GridCell, GridPreset};

const SNAPSHOT_DOMAIN: &str = "dnet";
const SNAPSHOT_VERSION_V1: &str = "v1";

/// Identifier prefix emitted for the compact binary loadout payload.
pub(crate) const LOADOUT_HEADER_V1: &str = "dnet:v1";
/// Delimiter used to separate the prefix, grid dimensions and payload.
const FIELD_DELIMITER: char = ':';

/// Snapshot of the defenses placed on the grid and its configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct LoadoutSnapshot {
    /// Number of grid columns the loadout was captured on.
    pub columns: u32,
    /// Number of grid rows the loadout was captured on.
    pub rows: u32,
    /// Grid preset the loadout was captured on.
    pub preset: GridPreset,
    /// Defenses composing the loadout.
    pub defenses: Vec<LoadoutDefense>,
}

/// Defense description captured within a loadout snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LoadoutDefense {
    /// Kind of defense represented by the snapshot.
    pub kind: DefenseKind,
    /// Cell anchoring the defense.
    pub cell: GridCell,
    /// Level the defense had been raised to.
    pub level: u8,
}

impl LoadoutSnapshot {
    /// Encodes the loadout into a single-line string suitable for sharing.
    #[must_use]
    pub(crate) fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(4 + self.defenses.len() * 6);
        payload.push(encode_preset(self.preset));
        encode_varint(self.defenses.len() as u32, &mut payload);
        for defense in &self.defenses {
            payload.push(encode_defense_kind(defense.kind));
            encode_varint(defense.cell.column(), &mut payload);
            encode_varint(defense.cell.row(), &mut payload);
            payload.push(defense.level);
        }
        let encoded = URL_SAFE_NO_PAD.encode(payload);
        format!(
            "{LOADOUT_HEADER_V1}:{}x{}:{encoded}",
            self.columns, self.rows
        )
    }

    /// Decodes a loadout from the provided string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, LoadoutTransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(LoadoutTransferError::EmptyPayload);
        }

        let mut parts = trimmed.split(FIELD_DELIMITER);
        let domain = parts.next().ok_or(LoadoutTransferError::MissingPrefix)?;
        let version = parts.next().ok_or(LoadoutTransferError::MissingVersion)?;
        let dimensions = parts
            .next()
            .ok_or(LoadoutTransferError::MissingDimensions)?;
        let payload = parts.next().ok_or(LoadoutTransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(LoadoutTransferError::InvalidPrefix(domain.to_owned()));
        }

        let (columns, rows) = parse_dimensions(dimensions)?;
        if version != SNAPSHOT_VERSION_V1 {
            return Err(LoadoutTransferError::UnsupportedVersion(
                version.to_owned(),
            ));
        }

        decode_v1(columns, rows, payload)
    }
}

/// Errors that can occur while decoding loadout transfer strings.
#[derive(Debug)]
pub(crate) enum LoadoutTransferError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing from the encoded loadout.
    MissingPrefix,
    /// The encoded loadout did not contain a version segment.
    MissingVersion,
    /// The encoded loadout did not include grid dimensions.
    MissingDimensions,
    /// The encoded loadout did not include the payload segment.
    MissingPayload,
    /// The encoded loadout used an unexpected prefix segment.
    InvalidPrefix(String),
    /// The encoded loadout used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The grid dimensions could not be parsed from the encoded loadout.
    InvalidDimensions(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The binary payload terminated before all fields were read.
    TruncatedBinaryPayload,
    /// The binary payload encoded a varint that exceeds the supported width.
    VarintOverflow,
    /// The binary payload referenced a grid preset that is not recognised.
    UnknownPreset(u8),
    /// The binary payload referenced a defense kind that is not recognised.
    UnknownDefenseKind(u8),
    /// The binary payload carried a defense level outside the valid band.
    InvalidLevel(u8),
    /// Additional bytes remained after decoding the binary payload.
    TrailingBinaryData,
}

impl fmt::Display for LoadoutTransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "loadout payload was empty"),
            Self::MissingPrefix => write!(f, "loadout string is missing the prefix"),
            Self::MissingVersion => write!(f, "loadout string is missing the version"),
            Self::MissingDimensions => {
                write!(f, "loadout string is missing the grid dimensions")
            }
            Self::MissingPayload => write!(f, "loadout string is missing the payload"),
            Self::InvalidPrefix(prefix) => {
                write!(f, "loadout prefix '{prefix}' is not supported")
            }
            Self::UnsupportedVersion(version) => {
                write!(f, "loadout version '{version}' is not supported")
            }
            Self::InvalidDimensions(dimensions) => {
                write!(f, "could not parse grid dimensions '{dimensions}'")
            }
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode loadout payload: {error}")
            }
            Self::TruncatedBinaryPayload => {
                write!(f, "binary loadout payload terminated unexpectedly")
            }
            Self::VarintOverflow => {
                write!(f, "binary loadout payload used an oversized varint")
            }
            Self::UnknownPreset(preset) => {
                write!(f, "binary loadout payload referenced unknown preset {preset}")
            }
            Self::UnknownDefenseKind(kind) => {
                write!(
                    f,
                    "binary loadout payload referenced unknown defense kind {kind}"
                )
            }
            Self::InvalidLevel(level) => {
                write!(f, "binary loadout payload carried invalid level {level}")
            }
            Self::TrailingBinaryData => {
                write!(f, "binary loadout payload contained trailing bytes")
            }
        }
    }
}

impl Error for LoadoutTransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            _ => None,
        }
    }
}

fn decode_v1(
    columns: u32,
    rows: u32,
    payload: &str,
) -> Result<LoadoutSnapshot, LoadoutTransferError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.as_bytes())
        .map_err(LoadoutTransferError::InvalidEncoding)?;
    let mut cursor = 0usize;

    let preset = decode_preset(read_u8(&bytes, &mut cursor)?)?;
    let defense_count = decode_varint(&bytes, &mut cursor)? as usize;
    let mut defenses = Vec::with_capacity(defense_count);
    for _ in 0..defense_count {
        let kind = decode_defense_kind(read_u8(&bytes, &mut cursor)?)?;
        let column = decode_varint(&bytes, &mut cursor)?;
        let row = decode_varint(&bytes, &mut cursor)?;
        let level = read_u8(&bytes, &mut cursor)?;
        if level == 0 || level > darknet_defence_core::MAX_DEFENSE_LEVEL {
            return Err(LoadoutTransferError::InvalidLevel(level));
        }
        defenses.push(LoadoutDefense {
            kind,
            cell: GridCell::new(column, row),
            level,
        });
    }

    if cursor != bytes.len() {
        return Err(LoadoutTransferError::TrailingBinaryData);
    }

    Ok(LoadoutSnapshot {
        columns,
        rows,
        preset,
        defenses,
    })
}

fn encode_varint(mut value: u32, buffer: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buffer.push(byte);
            break;
        }
        buffer.push(byte | 0x80);
    }
}

fn decode_varint(bytes: &[u8], cursor: &mut usize) -> Result<u32, LoadoutTransferError> {
    let mut value = 0u32;
    let mut shift = 0u32;
    for _ in 0..5 {
        if *cursor >= bytes.len() {
            return Err(LoadoutTransferError::TruncatedBinaryPayload);
        }
        let byte = bytes[*cursor];
        *cursor += 1;
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(LoadoutTransferError::VarintOverflow)
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> Result<u8, LoadoutTransferError> {
    if *cursor >= bytes.len() {
        return Err(LoadoutTransferError::TruncatedBinaryPayload);
    }
    let byte = bytes[*cursor];
    *cursor += 1;
    Ok(byte)
}

fn encode_preset(preset: GridPreset) -> u8 {
    match preset {
        GridPreset::Standard => 0,
        GridPreset::Compact => 1,
    }
}

fn decode_preset(value: u8) -> Result<GridPreset, LoadoutTransferError> {
    match value {
        0 => Ok(GridPreset::Standard),
        1 => Ok(GridPreset::Compact),
        other => Err(LoadoutTransferError::UnknownPreset(other)),
    }
}

fn encode_defense_kind(kind: DefenseKind) -> u8 {
    match kind {
        DefenseKind::Firewall => 0,
        DefenseKind::Encryption => 1,
        DefenseKind::Decoy => 2,
        DefenseKind::Mirror => 3,
        DefenseKind::Anonymity => 4,
        DefenseKind::Distributor => 5,
    }
}

fn decode_defense_kind(value: u8) -> Result<DefenseKind, LoadoutTransferError> {
    match value {
        0 => Ok(DefenseKind::Firewall),
        1 => Ok(DefenseKind::Encryption),
        2 => Ok(DefenseKind::Decoy),
        3 => Ok(DefenseKind::Mirror),
        4 => Ok(DefenseKind::Anonymity),
        5 => Ok(DefenseKind::Distributor),
        other => Err(LoadoutTransferError::UnknownDefenseKind(other)),
    }
}

fn parse_dimensions(dimensions: &str) -> Result<(u32, u32), LoadoutTransferError> {
    let (columns, rows) = dimensions
        .split_once(['x', 'X'])
        .ok_or_else(|| LoadoutTransferError::InvalidDimensions(dimensions.to_owned()))?;

    let columns = columns
        .trim()
        .parse::<u32>()
        .map_err(|_| LoadoutTransferError::InvalidDimensions(dimensions.to_owned()))?;
    let rows = rows
        .trim()
        .parse::<u32>()
        .map_err(|_| LoadoutTransferError::InvalidDimensions(dimensions.to_owned()))?;

    if columns == 0 || rows == 0 {
        return Err(LoadoutTransferError::InvalidDimensions(
            dimensions.to_owned(),
        ));
    }

    Ok((columns, rows))
}
