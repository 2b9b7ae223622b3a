//! The symbol catalog (C6): enumeration of server-side named data items.
//!
//! Discovery is two reads per device: `SYM_UPLOADINFO2` yields the entry
//! count and table byte length, `SYM_UPLOAD` yields the packed table. Each
//! entry opens with a 30-byte fixed head (entry length, index group, index
//! offset, size, datatype code, flags, then three u16 string lengths) and
//! carries name, type name, and comment as NUL-terminated CP-1252 strings.
//! The parser advances by the declared entry length, so unknown trailing
//! fields in an entry are skipped, not misparsed.

use crate::connection::Connection;
use crate::errors::{ClientError, Result};
use catio_core::ads::string::{decode_plc_string, encode_plc_string};
use catio_core::ads::{AdsError, IndexGroup, IndexOffset, NotificationHandle, index_group};
use catio_core::ams::AmsAddr;
use catio_core::protocol::ProtocolError;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Datatype codes this client can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AdsDataType {
    /// Single bit, one byte on the wire.
    Bit,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Real32,
    Real64,
    /// Fixed-length CP-1252 string.
    String,
    /// Composite type read and written as an opaque byte range.
    BigType,
}

impl AdsDataType {
    /// Maps a wire datatype code; `None` for unrecognized codes.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            2 => Some(Self::Int16),
            3 => Some(Self::Int32),
            4 => Some(Self::Real32),
            5 => Some(Self::Real64),
            16 => Some(Self::Int8),
            17 => Some(Self::UInt8),
            18 => Some(Self::UInt16),
            19 => Some(Self::UInt32),
            20 => Some(Self::Int64),
            21 => Some(Self::UInt64),
            30 => Some(Self::String),
            33 => Some(Self::Bit),
            65 => Some(Self::BigType),
            _ => None,
        }
    }

    /// The wire datatype code.
    pub fn code(&self) -> u32 {
        match self {
            Self::Int16 => 2,
            Self::Int32 => 3,
            Self::Real32 => 4,
            Self::Real64 => 5,
            Self::Int8 => 16,
            Self::UInt8 => 17,
            Self::UInt16 => 18,
            Self::UInt32 => 19,
            Self::Int64 => 20,
            Self::UInt64 => 21,
            Self::String => 30,
            Self::Bit => 33,
            Self::BigType => 65,
        }
    }
}

/// A runtime handle on a server-side named value.
///
/// `(index_group, index_offset, size)` fully determines addressing for
/// reads and writes. `notification` is set iff a subscription is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol {
    /// Fully qualified name, unique within its device.
    pub name: String,
    /// Id of the owning device.
    pub device_id: u32,
    pub data_type: AdsDataType,
    /// Declared type name, e.g. `"BOOL"` or a struct name.
    pub type_name: String,
    /// Byte size of the value.
    pub size: u32,
    pub index_group: IndexGroup,
    pub index_offset: IndexOffset,
    /// Optional description from the PLC source.
    pub comment: Option<String>,
    /// Handle of the active notification subscription, if any.
    pub notification: Option<NotificationHandle>,
}

/// The parsed symbol table of one device.
#[derive(Debug, Clone, Default)]
pub struct SymbolCatalog {
    device_id: u32,
    symbols: Vec<Symbol>,
    by_name: HashMap<String, usize>,
    dropped: usize,
}

impl SymbolCatalog {
    /// Returns the owning device id.
    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Returns every symbol, in table order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Returns the number of symbols in the catalog.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` when the catalog holds no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the number of table entries skipped for unrecognized
    /// datatype codes or duplicate names.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Looks up a symbol by its fully qualified name.
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.by_name.get(name).map(|&i| &self.symbols[i])
    }

    /// Records an active notification handle on a symbol.
    pub(crate) fn set_notification(
        &mut self,
        name: &str,
        handle: Option<NotificationHandle>,
    ) -> bool {
        match self.by_name.get(name) {
            Some(&i) => {
                self.symbols[i].notification = handle;
                true
            }
            None => false,
        }
    }
}

/// The fixed head of a symbol table entry.
const ENTRY_HEAD: usize = 30;

/// Parses a symbol table blob.
///
/// Entries with unrecognized datatype codes or duplicate names produce a
/// diagnostic and are counted in [`SymbolCatalog::dropped`]; they never
/// abort the enumeration.
pub fn parse_symbol_table(device_id: u32, blob: &[u8]) -> Result<SymbolCatalog> {
    let mut catalog = SymbolCatalog {
        device_id,
        ..SymbolCatalog::default()
    };

    let mut cursor = 0usize;
    while cursor + ENTRY_HEAD <= blob.len() {
        let entry = &blob[cursor..];
        let entry_len = u32::from_le_bytes(entry[0..4].try_into().unwrap()) as usize;
        if entry_len < ENTRY_HEAD || cursor + entry_len > blob.len() {
            return Err(ClientError::Protocol(ProtocolError::Ads(
                AdsError::UnexpectedDataLength {
                    expected: entry_len.max(ENTRY_HEAD),
                    got: blob.len() - cursor,
                },
            )));
        }
        let entry = &blob[cursor..cursor + entry_len];

        let index_group = u32::from_le_bytes(entry[4..8].try_into().unwrap());
        let index_offset = u32::from_le_bytes(entry[8..12].try_into().unwrap());
        let size = u32::from_le_bytes(entry[12..16].try_into().unwrap());
        let type_code = u32::from_le_bytes(entry[16..20].try_into().unwrap());
        // flags at 20..24 are carried on the wire but unused here
        let name_len = u16::from_le_bytes([entry[24], entry[25]]) as usize;
        let type_len = u16::from_le_bytes([entry[26], entry[27]]) as usize;
        let comment_len = u16::from_le_bytes([entry[28], entry[29]]) as usize;

        // each string is followed by one NUL
        let strings_len = name_len + 1 + type_len + 1 + comment_len + 1;
        if ENTRY_HEAD + strings_len > entry_len {
            return Err(ClientError::Protocol(ProtocolError::Ads(
                AdsError::UnexpectedDataLength {
                    expected: ENTRY_HEAD + strings_len,
                    got: entry_len,
                },
            )));
        }

        let name_at = ENTRY_HEAD;
        let type_at = name_at + name_len + 1;
        let comment_at = type_at + type_len + 1;

        let name = decode_plc_string(&entry[name_at..name_at + name_len]).into_owned();
        let type_name = decode_plc_string(&entry[type_at..type_at + type_len]).into_owned();
        let comment = if comment_len == 0 {
            None
        } else {
            Some(decode_plc_string(&entry[comment_at..comment_at + comment_len]).into_owned())
        };

        cursor += entry_len;

        let Some(data_type) = AdsDataType::from_code(type_code) else {
            warn!(symbol = %name, code = type_code, "skipping symbol with unsupported datatype");
            catalog.dropped += 1;
            continue;
        };

        if catalog.by_name.contains_key(&name) {
            warn!(symbol = %name, device_id, "duplicate symbol name; keeping first");
            catalog.dropped += 1;
            continue;
        }

        catalog.by_name.insert(name.clone(), catalog.symbols.len());
        catalog.symbols.push(Symbol {
            name,
            device_id,
            data_type,
            type_name,
            size,
            index_group,
            index_offset,
            comment,
            notification: None,
        });
    }

    debug!(
        device_id,
        symbols = catalog.symbols.len(),
        dropped = catalog.dropped,
        "parsed symbol table"
    );
    Ok(catalog)
}

impl Connection {
    /// Uploads and parses the symbol table of the device behind `target`.
    pub async fn upload_symbols(&self, target: AmsAddr, device_id: u32) -> Result<SymbolCatalog> {
        let info = self
            .read(target, index_group::SYM_UPLOADINFO2, 0, 8)
            .await?;
        if info.len() < 8 {
            return Err(ClientError::Protocol(ProtocolError::Ads(
                AdsError::UnexpectedDataLength {
                    expected: 8,
                    got: info.len(),
                },
            )));
        }
        let count = u32::from_le_bytes(info[0..4].try_into().unwrap());
        let table_len = u32::from_le_bytes(info[4..8].try_into().unwrap());

        let blob = self
            .read(target, index_group::SYM_UPLOAD, 0, table_len)
            .await?;
        let catalog = parse_symbol_table(device_id, &blob)?;

        if catalog.len() + catalog.dropped() != count as usize {
            warn!(
                declared = count,
                parsed = catalog.len(),
                dropped = catalog.dropped(),
                "symbol table entry count mismatch"
            );
        }
        Ok(catalog)
    }

    /// Fetches a value handle for a symbol name (`SYM_HNDBYNAME`).
    pub async fn handle_by_name(&self, target: AmsAddr, name: &str) -> Result<u32> {
        let data = self
            .read_write(
                target,
                index_group::SYM_HNDBYNAME,
                0,
                4,
                encode_plc_string(name),
            )
            .await?;
        if data.len() < 4 {
            return Err(ClientError::Protocol(ProtocolError::Ads(
                AdsError::UnexpectedDataLength {
                    expected: 4,
                    got: data.len(),
                },
            )));
        }
        Ok(u32::from_le_bytes(data[0..4].try_into().unwrap()))
    }

    /// Reads a value through a handle from [`handle_by_name`](Self::handle_by_name).
    pub async fn read_by_handle(
        &self,
        target: AmsAddr,
        handle: u32,
        length: u32,
    ) -> Result<Vec<u8>> {
        self.read(target, index_group::SYM_VALBYHND, handle, length)
            .await
    }

    /// Writes a value through a handle.
    pub async fn write_by_handle(
        &self,
        target: AmsAddr,
        handle: u32,
        data: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.write(target, index_group::SYM_VALBYHND, handle, data)
            .await
    }

    /// Releases a value handle.
    pub async fn release_handle(&self, target: AmsAddr, handle: u32) -> Result<()> {
        self.write(
            target,
            index_group::SYM_RELEASEHND,
            0,
            handle.to_le_bytes(),
        )
        .await
    }
}

/// Builds one wire-format symbol table entry. Shared with the test peer.
pub fn encode_symbol_entry(
    index_group: IndexGroup,
    index_offset: IndexOffset,
    size: u32,
    type_code: u32,
    name: &str,
    type_name: &str,
    comment: &str,
) -> Vec<u8> {
    let name_b = name.as_bytes();
    let type_b = type_name.as_bytes();
    let comment_b = comment.as_bytes();
    let entry_len = ENTRY_HEAD + name_b.len() + 1 + type_b.len() + 1 + comment_b.len() + 1;

    let mut out = Vec::with_capacity(entry_len);
    out.extend_from_slice(&(entry_len as u32).to_le_bytes());
    out.extend_from_slice(&index_group.to_le_bytes());
    out.extend_from_slice(&index_offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&type_code.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // flags
    out.extend_from_slice(&(name_b.len() as u16).to_le_bytes());
    out.extend_from_slice(&(type_b.len() as u16).to_le_bytes());
    out.extend_from_slice(&(comment_b.len() as u16).to_le_bytes());
    out.extend_from_slice(name_b);
    out.push(0);
    out.extend_from_slice(type_b);
    out.push(0);
    out.extend_from_slice(comment_b);
    out.push(0);
    out
}
