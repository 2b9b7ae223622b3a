//! Well-known index groups understood by TwinCAT I/O servers.
//!
//! An ADS read/write address is `(index group, index offset, length)`. The
//! groups below cover the symbol table, the sum (batched) commands, the
//! process image, and the EtherCAT introspection surface this crate issues
//! scripted command sequences against.

use super::IndexGroup;

// --- Symbol table access ---

/// Read `(symbol count, table byte length)` for the target's symbol table.
pub const SYM_UPLOADINFO2: IndexGroup = 0xF00F;
/// Read the packed symbol table blob.
pub const SYM_UPLOAD: IndexGroup = 0xF00B;
/// Read-write: write a symbol name, read back a 4-byte value handle.
pub const SYM_HNDBYNAME: IndexGroup = 0xF003;
/// Read or write a value addressed by a handle from [`SYM_HNDBYNAME`].
pub const SYM_VALBYHND: IndexGroup = 0xF005;
/// Release a handle obtained from [`SYM_HNDBYNAME`].
pub const SYM_RELEASEHND: IndexGroup = 0xF006;

// --- Sum (batched) commands ---

/// Batched read: the write payload packs sub-read headers.
pub const SUMUP_READ: IndexGroup = 0xF080;
/// Batched write.
pub const SUMUP_WRITE: IndexGroup = 0xF081;
/// Batched read-write.
pub const SUMUP_READ_WRITE: IndexGroup = 0xF082;

// --- Process image ---

/// Input process image, addressed by byte offset.
pub const IOIMAGE_RW_INPUT: IndexGroup = 0xF020;
/// Output process image, addressed by byte offset.
pub const IOIMAGE_RW_OUTPUT: IndexGroup = 0xF030;
/// Output process image, addressed by bit offset.
pub const IOIMAGE_RW_OUTPUT_BIT: IndexGroup = 0xF031;

// --- EtherCAT introspection (I/O server port 300 / master port 65535) ---

/// u32 count of I/O devices under the server. Offset 0.
pub const ECAT_DEVICE_COUNT: IndexGroup = 0xF100;
/// Per-device metadata block; offset is the 1-based device index.
///
/// Block layout (88 bytes): id u32, type u32, net id 6 bytes + 10 reserved,
/// name 64 bytes CP-1252 NUL-padded.
pub const ECAT_DEVICE_INFO: IndexGroup = 0xF101;
/// Device identity: vendor u32, product u32, revision u32. Master port.
pub const ECAT_DEVICE_IDENTITY: IndexGroup = 0xF120;
/// Six u32 frame counters: cyclic sent/lost, acyclic sent/lost, resent
/// cyclic/acyclic. Master port.
pub const ECAT_FRAME_COUNTERS: IndexGroup = 0xF121;
/// u32 link state, 0 = down, 1 = up. Master port.
pub const ECAT_LINK_STATE: IndexGroup = 0xF122;
/// u32 count of slaves on the device. Master port.
pub const ECAT_SLAVE_COUNT: IndexGroup = 0xF200;
/// n x u16 fixed slave addresses. Master port.
pub const ECAT_SLAVE_ADDRESSES: IndexGroup = 0xF201;
/// Per-slave info block; offset is the slave's fixed address.
///
/// Block layout (52 bytes): vendor u32, product u32, revision u32,
/// serial u32, position u16, parent address u16 (0 = device root),
/// EtherCAT state u16, link u16, name 28 bytes CP-1252 NUL-padded.
pub const ECAT_SLAVE_INFO: IndexGroup = 0xF210;
/// Per-slave counters; offset is the slave's fixed address.
///
/// Five u32: CRC errors on ports A-D, lost-link count.
pub const ECAT_SLAVE_COUNTERS: IndexGroup = 0xF211;

/// The size of the [`ECAT_DEVICE_INFO`] block on the wire.
pub const DEVICE_INFO_BLOCK_LEN: usize = 88;
/// The size of the [`ECAT_SLAVE_INFO`] block on the wire.
pub const SLAVE_INFO_BLOCK_LEN: usize = 52;
/// The size of the [`ECAT_FRAME_COUNTERS`] block on the wire.
pub const FRAME_COUNTERS_LEN: usize = 24;
/// The size of the [`ECAT_SLAVE_COUNTERS`] block on the wire.
pub const SLAVE_COUNTERS_LEN: usize = 20;
