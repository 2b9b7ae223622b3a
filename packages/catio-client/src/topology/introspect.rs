//! The scripted introspection sequence (C5).
//!
//! 1. Device info on the I/O server port gives name, version, build.
//! 2. A read of the device-count group gives `N`.
//! 3. One batched read-write fetches all `N` device metadata blocks.
//! 4. Per device, reads against its master port (65535) give identity,
//!    frame counters, link state, slave count, and the address list.
//! 5. Per slave address, reads give the info block and counters.
//! 6. Parent addresses are resolved into arena indices.

use super::{
    EcatIdentity, EcatState, FrameCounters, IoDevice, IoServer, IoSlave, LinkState, SlaveCounters,
    SlaveIndex,
};
use crate::connection::Connection;
use crate::errors::{ClientError, Result};
use catio_core::ads::index_group::{
    self, DEVICE_INFO_BLOCK_LEN, FRAME_COUNTERS_LEN, SLAVE_COUNTERS_LEN, SLAVE_INFO_BLOCK_LEN,
};
use catio_core::ads::string::decode_plc_string;
use catio_core::ads::{AdsError, IndexOffset};
use catio_core::ams::{AmsAddr, AmsNetId, port};
use catio_core::protocol::{ProtocolError, SumReadWriteItem};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Metadata of one device as returned by the per-device info block.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DeviceMeta {
    id: u32,
    device_type: u32,
    net_id: AmsNetId,
    name: String,
}

fn short_block(expected: usize, got: usize) -> ClientError {
    ClientError::Protocol(ProtocolError::Ads(AdsError::UnexpectedDataLength {
        expected,
        got,
    }))
}

fn parse_device_meta(block: &[u8]) -> Result<DeviceMeta> {
    if block.len() < DEVICE_INFO_BLOCK_LEN {
        return Err(short_block(DEVICE_INFO_BLOCK_LEN, block.len()));
    }

    Ok(DeviceMeta {
        id: u32::from_le_bytes(block[0..4].try_into().unwrap()),
        device_type: u32::from_le_bytes(block[4..8].try_into().unwrap()),
        net_id: AmsNetId::try_from_slice(&block[8..14]).unwrap(),
        name: decode_plc_string(&block[24..88]).into_owned(),
    })
}

fn parse_identity(block: &[u8]) -> Result<EcatIdentity> {
    if block.len() < 12 {
        return Err(short_block(12, block.len()));
    }
    Ok(EcatIdentity {
        vendor: u32::from_le_bytes(block[0..4].try_into().unwrap()),
        product: u32::from_le_bytes(block[4..8].try_into().unwrap()),
        revision: u32::from_le_bytes(block[8..12].try_into().unwrap()),
    })
}

fn parse_frame_counters(block: &[u8]) -> Result<FrameCounters> {
    if block.len() < FRAME_COUNTERS_LEN {
        return Err(short_block(FRAME_COUNTERS_LEN, block.len()));
    }
    let word = |i: usize| u32::from_le_bytes(block[i * 4..i * 4 + 4].try_into().unwrap());
    Ok(FrameCounters {
        cyclic_sent: word(0),
        cyclic_lost: word(1),
        acyclic_sent: word(2),
        acyclic_lost: word(3),
        resent_cyclic: word(4),
        resent_acyclic: word(5),
    })
}

/// A slave info block, before parent resolution.
struct SlaveMeta {
    name: String,
    identity: EcatIdentity,
    serial: u32,
    position: u16,
    parent_address: u16,
    state: EcatState,
    link: u16,
}

fn parse_slave_meta(block: &[u8]) -> Result<SlaveMeta> {
    if block.len() < SLAVE_INFO_BLOCK_LEN {
        return Err(short_block(SLAVE_INFO_BLOCK_LEN, block.len()));
    }
    Ok(SlaveMeta {
        identity: parse_identity(&block[0..12])?,
        serial: u32::from_le_bytes(block[12..16].try_into().unwrap()),
        position: u16::from_le_bytes([block[16], block[17]]),
        parent_address: u16::from_le_bytes([block[18], block[19]]),
        state: EcatState::from(u16::from_le_bytes([block[20], block[21]])),
        link: u16::from_le_bytes([block[22], block[23]]),
        name: decode_plc_string(&block[24..52]).into_owned(),
    })
}

fn parse_slave_counters(block: &[u8]) -> Result<SlaveCounters> {
    if block.len() < SLAVE_COUNTERS_LEN {
        return Err(short_block(SLAVE_COUNTERS_LEN, block.len()));
    }
    let word = |i: usize| u32::from_le_bytes(block[i * 4..i * 4 + 4].try_into().unwrap());
    Ok(SlaveCounters {
        crc: [word(0), word(1), word(2), word(3)],
        lost_links: word(4),
    })
}

fn read_u32(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(short_block(4, data.len()));
    }
    Ok(u32::from_le_bytes(data[0..4].try_into().unwrap()))
}

async fn phase<T>(
    name: &'static str,
    deadline: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::RequestTimeout {
            context: format!("introspection phase {name:?}"),
            after: deadline,
        }),
    }
}

/// Reconstructs the full topology. One call per session unless explicitly
/// re-invoked; the caller caches the result.
pub(crate) async fn introspect(conn: &Connection, deadline: Duration) -> Result<IoServer> {
    let server_addr = conn.io_server();

    let info = phase("device info", deadline, conn.read_device_info(server_addr)).await?;

    let count_raw = phase(
        "device count",
        deadline,
        conn.read(server_addr, index_group::ECAT_DEVICE_COUNT, 0, 4),
    )
    .await?;
    let device_count = read_u32(&count_raw)?;
    debug!(device_count, "scanning devices");

    let metas = phase(
        "device metadata",
        deadline,
        fetch_device_metas(conn, server_addr, device_count),
    )
    .await?;

    let mut devices = Vec::with_capacity(metas.len());
    for meta in metas {
        let device = phase(
            "device scan",
            deadline,
            scan_device(conn, meta),
        )
        .await?;
        devices.push(device);
    }

    Ok(IoServer {
        name: info.name.as_str().into_owned(),
        version: info.version(),
        build: info.build,
        devices,
    })
}

/// Fetches all device metadata blocks in one batched round trip.
async fn fetch_device_metas(
    conn: &Connection,
    server_addr: AmsAddr,
    device_count: u32,
) -> Result<Vec<DeviceMeta>> {
    if device_count == 0 {
        return Ok(Vec::new());
    }

    let items: Vec<SumReadWriteItem> = (1..=device_count)
        .map(|index| SumReadWriteItem {
            index_group: index_group::ECAT_DEVICE_INFO,
            index_offset: index as IndexOffset,
            read_length: DEVICE_INFO_BLOCK_LEN as u32,
            write_data: Vec::new(),
        })
        .collect();

    let results = conn.sum_read_write(server_addr, &items).await?;

    let mut metas = Vec::with_capacity(results.len());
    for (index, item) in results.iter().enumerate() {
        if !item.result.is_ok() {
            warn!(index = index + 1, code = %item.result, "device metadata read failed");
            continue;
        }
        metas.push(parse_device_meta(&item.data)?);
    }
    Ok(metas)
}

/// Builds one device record from its master port.
async fn scan_device(conn: &Connection, meta: DeviceMeta) -> Result<IoDevice> {
    let master = AmsAddr::new(meta.net_id, port::ECAT_MASTER);

    let identity = parse_identity(
        &conn
            .read(master, index_group::ECAT_DEVICE_IDENTITY, 0, 12)
            .await?,
    )?;
    let frame_counters = parse_frame_counters(
        &conn
            .read(
                master,
                index_group::ECAT_FRAME_COUNTERS,
                0,
                FRAME_COUNTERS_LEN as u32,
            )
            .await?,
    )?;
    let link_state = LinkState::from(read_u32(
        &conn
            .read(master, index_group::ECAT_LINK_STATE, 0, 4)
            .await?,
    )?);

    let slave_count = read_u32(
        &conn
            .read(master, index_group::ECAT_SLAVE_COUNT, 0, 4)
            .await?,
    )?;

    let mut slaves = Vec::with_capacity(slave_count as usize);
    if slave_count > 0 {
        let raw = conn
            .read(
                master,
                index_group::ECAT_SLAVE_ADDRESSES,
                0,
                slave_count * 2,
            )
            .await?;
        if raw.len() < slave_count as usize * 2 {
            return Err(short_block(slave_count as usize * 2, raw.len()));
        }
        let addresses: Vec<u16> = raw
            .chunks_exact(2)
            .take(slave_count as usize)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();

        for address in addresses {
            slaves.push(scan_slave(conn, master, address).await?);
        }
    }

    link_parents(&mut slaves, &meta.name);

    Ok(IoDevice {
        id: meta.id,
        device_type: meta.device_type,
        name: meta.name,
        net_id: meta.net_id,
        identity,
        link_state,
        frame_counters,
        slaves,
    })
}

async fn scan_slave(conn: &Connection, master: AmsAddr, address: u16) -> Result<IoSlave> {
    let meta = parse_slave_meta(
        &conn
            .read(
                master,
                index_group::ECAT_SLAVE_INFO,
                address as IndexOffset,
                SLAVE_INFO_BLOCK_LEN as u32,
            )
            .await?,
    )?;
    let counters = parse_slave_counters(
        &conn
            .read(
                master,
                index_group::ECAT_SLAVE_COUNTERS,
                address as IndexOffset,
                SLAVE_COUNTERS_LEN as u32,
            )
            .await?,
    )?;

    let name = if meta.name.is_empty() {
        format!("Term {address}")
    } else {
        meta.name
    };

    Ok(IoSlave {
        address,
        position: meta.position,
        name,
        identity: meta.identity,
        serial: meta.serial,
        parent_address: meta.parent_address,
        parent: None,
        orphan: false,
        state: meta.state,
        link: meta.link,
        counters,
    })
}

/// Resolves parent addresses into arena indices.
///
/// Parent address zero means the device root. An address that names no
/// present slave leaves the slave at the root with its orphan flag set.
fn link_parents(slaves: &mut [IoSlave], device_name: &str) {
    let by_address: HashMap<u16, usize> = slaves
        .iter()
        .enumerate()
        .map(|(i, s)| (s.address, i))
        .collect();

    for i in 0..slaves.len() {
        let parent_address = slaves[i].parent_address;
        if parent_address == 0 {
            continue;
        }
        match by_address.get(&parent_address) {
            Some(&parent) if parent != i => slaves[i].parent = Some(SlaveIndex(parent)),
            _ => {
                warn!(
                    device = device_name,
                    address = slaves[i].address,
                    parent_address,
                    "parent address not present; linking under device root"
                );
                slaves[i].orphan = true;
            }
        }
    }
}

/// Re-reads frame counters and link state of every device in place.
pub(crate) async fn refresh_counters(conn: &Connection, devices: &mut [IoDevice]) -> Result<()> {
    for device in devices.iter_mut() {
        let master = AmsAddr::new(device.net_id, port::ECAT_MASTER);
        device.frame_counters = parse_frame_counters(
            &conn
                .read(
                    master,
                    index_group::ECAT_FRAME_COUNTERS,
                    0,
                    FRAME_COUNTERS_LEN as u32,
                )
                .await?,
        )?;
        for slave in device.slaves.iter_mut() {
            slave.counters = parse_slave_counters(
                &conn
                    .read(
                        master,
                        index_group::ECAT_SLAVE_COUNTERS,
                        slave.address as IndexOffset,
                        SLAVE_COUNTERS_LEN as u32,
                    )
                    .await?,
            )?;
        }
    }
    Ok(())
}

/// Re-reads the link state of every device in place.
pub(crate) async fn refresh_link_states(conn: &Connection, devices: &mut [IoDevice]) -> Result<()> {
    for device in devices.iter_mut() {
        let master = AmsAddr::new(device.net_id, port::ECAT_MASTER);
        device.link_state = LinkState::from(read_u32(
            &conn
                .read(master, index_group::ECAT_LINK_STATE, 0, 4)
                .await?,
        )?);
    }
    Ok(())
}
