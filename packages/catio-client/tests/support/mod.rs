//! An in-process peer speaking the ADS wire contract, used by the
//! end-to-end tests: UDP discovery/route handling plus a TCP server with a
//! register store, a symbol table, and cyclic notification pushers.

use catio_client::symbols::encode_symbol_entry;
use catio_core::ads::index_group::{
    DEVICE_INFO_BLOCK_LEN, ECAT_DEVICE_COUNT, ECAT_DEVICE_IDENTITY, ECAT_DEVICE_INFO,
    ECAT_FRAME_COUNTERS, ECAT_LINK_STATE, ECAT_SLAVE_ADDRESSES, ECAT_SLAVE_COUNT,
    ECAT_SLAVE_COUNTERS, ECAT_SLAVE_INFO, SLAVE_COUNTERS_LEN, SLAVE_INFO_BLOCK_LEN,
    SUMUP_READ_WRITE, SYM_HNDBYNAME, SYM_RELEASEHND, SYM_UPLOAD, SYM_UPLOADINFO2, SYM_VALBYHND,
};
use catio_core::ads::string::decode_plc_string;
use catio_core::ads::{AdsReturnCode, AdsState, FixedString, NotificationHandle, WindowsFileTime};
use catio_core::ams::{AmsAddr, AmsNetId, port};
use catio_core::io::{AmsFrame, AmsReader, AmsWriter};
use catio_core::protocol::{
    AddNotificationRequest, AddNotificationResponse, DeleteNotificationRequest,
    DeleteNotificationResponse, DeviceInfo, DeviceNotificationOwned, NotificationSampleOwned,
    NotificationStampOwned, ReadDeviceInfoResponse, ReadRequest, ReadResponseOwned,
    ReadStateResponse, ReadWriteRequest, ReadWriteResponseOwned, WriteRequest, WriteResponse,
};
use catio_core::udp::{ServiceId, Tag, TagId, UdpFrame};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

pub const PEER_NET_ID: AmsNetId = AmsNetId::new(10, 0, 0, 1, 3, 1);

/// Slave addresses the seeded topology exposes.
pub const SLAVE_ADDRESSES: [u16; 3] = [1001, 1002, 1003];

pub struct NotificationEntry {
    pusher: JoinHandle<()>,
}

#[derive(Default)]
pub struct PeerState {
    /// The (group, offset) -> bytes register store backing reads and writes.
    pub registers: Mutex<HashMap<(u32, u32), Vec<u8>>>,
    /// Active notification handles and their pusher tasks.
    pub notifications: Mutex<HashMap<u32, NotificationEntry>>,
    /// Value handles issued by SYM_HNDBYNAME: handle -> (group, offset).
    pub value_handles: Mutex<HashMap<u32, (u32, u32)>>,
    /// Symbol name -> (group, offset) for handle lookups.
    pub symbol_addrs: Mutex<HashMap<String, (u32, u32)>>,
    /// Routes registered over UDP.
    pub routes: Mutex<Vec<String>>,
    pub next_handle: AtomicU32,
    /// When set to n, the peer buffers n Read requests and answers them in
    /// reverse arrival order.
    pub reverse_batch: Mutex<Option<usize>>,
    /// Per-connection serve tasks, severed when the peer drops.
    conn_tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub struct TestPeer {
    pub tcp_addr: SocketAddr,
    pub udp_addr: SocketAddr,
    pub state: Arc<PeerState>,
    tcp_task: JoinHandle<()>,
    udp_task: JoinHandle<()>,
}

impl Drop for TestPeer {
    fn drop(&mut self) {
        self.tcp_task.abort();
        self.udp_task.abort();
        for task in self.state.conn_tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        let notifications = self.state.notifications.lock().unwrap();
        for entry in notifications.values() {
            entry.pusher.abort();
        }
    }
}

impl TestPeer {
    pub async fn start() -> Self {
        let state = Arc::new(PeerState {
            next_handle: AtomicU32::new(1),
            ..PeerState::default()
        });
        seed_topology(&state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let tcp_addr = listener.local_addr().unwrap();
        let tcp_state = Arc::clone(&state);
        let tcp_task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => return,
                };
                let task = tokio::spawn(serve_connection(stream, Arc::clone(&tcp_state)));
                tcp_state.conn_tasks.lock().unwrap().push(task);
            }
        });

        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let udp_addr = udp.local_addr().unwrap();
        let udp_state = Arc::clone(&state);
        let udp_task = tokio::spawn(serve_udp(udp, udp_state));

        Self {
            tcp_addr,
            udp_addr,
            state,
            tcp_task,
            udp_task,
        }
    }

    pub fn set_register(&self, group: u32, offset: u32, bytes: Vec<u8>) {
        self.state
            .registers
            .lock()
            .unwrap()
            .insert((group, offset), bytes);
    }

    pub fn active_notifications(&self) -> usize {
        self.state.notifications.lock().unwrap().len()
    }

    pub fn routes(&self) -> Vec<String> {
        self.state.routes.lock().unwrap().clone()
    }

    /// Arms reverse-order reply mode for the next `n` Read requests.
    pub fn arm_reverse_batch(&self, n: usize) {
        *self.state.reverse_batch.lock().unwrap() = Some(n);
    }
}

/// Builds the symbol table blob and registers every symbol's backing store.
pub fn seed_symbols(state: &PeerState, count: usize) -> usize {
    let mut blob = Vec::new();
    let mut addrs = state.symbol_addrs.lock().unwrap();
    let mut registers = state.registers.lock().unwrap();

    for i in 0..count {
        let name = if i == 0 {
            "Term 2 (EL1014).Channel 1.Input".to_string()
        } else {
            format!("Term {} (EL1014).Channel {}.Input", 2 + i / 4, 1 + i % 4)
        };
        let group = 0xF021u32;
        let offset = 0x100 + i as u32;
        blob.extend(encode_symbol_entry(group, offset, 1, 33, &name, "BIT", ""));
        addrs.insert(name, (group, offset));
        registers.insert((group, offset), vec![0u8]);
    }

    let mut info = Vec::new();
    info.extend_from_slice(&(count as u32).to_le_bytes());
    info.extend_from_slice(&(blob.len() as u32).to_le_bytes());
    registers.insert((SYM_UPLOADINFO2, 0), info);
    let blob_len = blob.len();
    registers.insert((SYM_UPLOAD, 0), blob);
    blob_len
}

fn seed_topology(state: &PeerState) {
    let mut registers = state.registers.lock().unwrap();

    registers.insert((ECAT_DEVICE_COUNT, 0), 1u32.to_le_bytes().to_vec());

    let mut device = vec![0u8; DEVICE_INFO_BLOCK_LEN];
    device[0..4].copy_from_slice(&1u32.to_le_bytes()); // id
    device[4..8].copy_from_slice(&5u32.to_le_bytes()); // type
    device[8..14].copy_from_slice(PEER_NET_ID.as_bytes());
    let name = b"Device 1 (EtherCAT)";
    device[24..24 + name.len()].copy_from_slice(name);
    registers.insert((ECAT_DEVICE_INFO, 1), device);

    let mut identity = Vec::new();
    for v in [2u32, 0x044C_2C52, 0x0011_0000] {
        identity.extend_from_slice(&v.to_le_bytes());
    }
    registers.insert((ECAT_DEVICE_IDENTITY, 0), identity);

    let mut counters = Vec::new();
    for v in [1000u32, 0, 50, 0, 2, 0] {
        counters.extend_from_slice(&v.to_le_bytes());
    }
    registers.insert((ECAT_FRAME_COUNTERS, 0), counters);

    registers.insert((ECAT_LINK_STATE, 0), 1u32.to_le_bytes().to_vec());
    registers.insert(
        (ECAT_SLAVE_COUNT, 0),
        (SLAVE_ADDRESSES.len() as u32).to_le_bytes().to_vec(),
    );

    let mut addresses = Vec::new();
    for addr in SLAVE_ADDRESSES {
        addresses.extend_from_slice(&addr.to_le_bytes());
    }
    registers.insert((ECAT_SLAVE_ADDRESSES, 0), addresses);

    for (i, addr) in SLAVE_ADDRESSES.iter().enumerate() {
        let mut info = vec![0u8; SLAVE_INFO_BLOCK_LEN];
        info[0..4].copy_from_slice(&2u32.to_le_bytes()); // vendor
        info[4..8].copy_from_slice(&(0x03F6_3052 + i as u32).to_le_bytes()); // product
        info[8..12].copy_from_slice(&0x0011_0000u32.to_le_bytes()); // revision
        info[12..16].copy_from_slice(&(9000 + i as u32).to_le_bytes()); // serial
        info[16..18].copy_from_slice(&(i as u16 + 1).to_le_bytes()); // position
        // first slave is the coupler at the root; the rest hang off it
        let parent: u16 = if i == 0 { 0 } else { SLAVE_ADDRESSES[0] };
        info[18..20].copy_from_slice(&parent.to_le_bytes());
        info[20..22].copy_from_slice(&8u16.to_le_bytes()); // OP
        info[22..24].copy_from_slice(&0u16.to_le_bytes());
        let name = if i == 0 {
            "Term 1 (EK1100)".to_string()
        } else {
            format!("Term {} (EL1014)", i + 1)
        };
        info[24..24 + name.len()].copy_from_slice(name.as_bytes());
        registers.insert((ECAT_SLAVE_INFO, *addr as u32), info);

        let mut slave_counters = vec![0u8; SLAVE_COUNTERS_LEN];
        slave_counters[16..20].copy_from_slice(&0u32.to_le_bytes());
        registers.insert((ECAT_SLAVE_COUNTERS, *addr as u32), slave_counters);
    }

    // the digital output of test scenario 3
    registers.insert((0xF021, 0x10), vec![0u8]);
}

async fn serve_udp(socket: UdpSocket, state: Arc<PeerState>) {
    let mut buf = vec![0u8; 2048];
    let peer_addr = AmsAddr::new(PEER_NET_ID, port::SYSTEM_SERVICE);

    loop {
        let Ok((len, from)) = socket.recv_from(&mut buf).await else {
            return;
        };
        let Ok(frame) = UdpFrame::parse(&buf[..len]) else {
            continue;
        };

        let reply = match frame.service() {
            ServiceId::Identify => UdpFrame::response(
                frame.invoke_id(),
                ServiceId::Identify,
                peer_addr,
                vec![
                    Tag::string(TagId::HostName, "test-peer"),
                    Tag::net_id(PEER_NET_ID),
                    Tag::string(TagId::Version, "3.1.4024"),
                ],
            ),
            ServiceId::AddRoute => {
                let status = match frame.tag(TagId::RouteName) {
                    Some(tag) => {
                        state.routes.lock().unwrap().push(tag.as_string());
                        0u32
                    }
                    None => 0x704,
                };
                UdpFrame::response(
                    frame.invoke_id(),
                    ServiceId::AddRoute,
                    peer_addr,
                    vec![Tag::status(status)],
                )
            }
            ServiceId::DelRoute => {
                if let Some(tag) = frame.tag(TagId::RouteName) {
                    let name = tag.as_string();
                    state.routes.lock().unwrap().retain(|r| r != &name);
                }
                UdpFrame::response(
                    frame.invoke_id(),
                    ServiceId::DelRoute,
                    peer_addr,
                    vec![Tag::status(0)],
                )
            }
            _ => continue,
        };
        let _ = socket.send_to(&reply.to_vec(), from).await;
    }
}

type SharedWriter = Arc<tokio::sync::Mutex<AmsWriter<OwnedWriteHalf>>>;

async fn serve_connection(stream: tokio::net::TcpStream, state: Arc<PeerState>) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = AmsReader::new(read_half);
    let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(AmsWriter::new(write_half)));

    let mut reversed: Vec<AmsFrame> = Vec::new();

    loop {
        let frame = match reader.read_frame().await {
            Ok(frame) => frame,
            Err(_) => return,
        };

        let batch = *state.reverse_batch.lock().unwrap();
        if let Some(n) = batch {
            reversed.push(frame);
            if reversed.len() == n {
                *state.reverse_batch.lock().unwrap() = None;
                reversed.reverse();
                for frame in reversed.drain(..) {
                    handle_frame(&frame, &state, &writer).await;
                }
            }
            continue;
        }

        handle_frame(&frame, &state, &writer).await;
    }
}

async fn handle_frame(frame: &AmsFrame, state: &Arc<PeerState>, writer: &SharedWriter) {
    use catio_core::ads::AdsCommand;

    let Ok((header, _)) = catio_core::ads::AdsHeader::parse_prefix(frame.payload()) else {
        return;
    };
    let client = *header.source();
    let server = *header.target();
    let invoke_id = header.invoke_id();

    let reply: AmsFrame = match header.command_id() {
        AdsCommand::ReadDeviceInfo => ReadDeviceInfoResponse::new(
            client,
            server,
            invoke_id,
            AdsReturnCode::Ok,
            DeviceInfo {
                major: 3,
                minor: 1,
                build: 4024,
                name: FixedString::from_str_checked("I/O Server").unwrap(),
            },
        )
        .to_frame(),

        AdsCommand::ReadState => ReadStateResponse::new(
            client,
            server,
            invoke_id,
            AdsReturnCode::Ok,
            AdsState::Run,
            0,
        )
        .to_frame(),

        AdsCommand::Read => {
            let req = ReadRequest::try_from(frame).unwrap();
            let (result, data) = do_read(
                state,
                req.index_group(),
                req.index_offset(),
                req.length(),
            );
            ReadResponseOwned::new(client, server, invoke_id, result, data).to_frame()
        }

        AdsCommand::Write => {
            let req = WriteRequest::try_from(frame).unwrap();
            let result = do_write(state, req.index_group(), req.index_offset(), req.data());
            WriteResponse::new(client, server, invoke_id, result).to_frame()
        }

        AdsCommand::ReadWrite => {
            let req = ReadWriteRequest::try_from(frame).unwrap();
            let (result, data) = do_read_write(
                state,
                req.index_group(),
                req.index_offset(),
                req.read_length(),
                req.data(),
            );
            ReadWriteResponseOwned::new(client, server, invoke_id, result, data).to_frame()
        }

        AdsCommand::AddDeviceNotification => {
            let req = AddNotificationRequest::try_from(frame).unwrap();
            let handle = state.next_handle.fetch_add(1, Ordering::Relaxed);
            let pusher = spawn_pusher(
                Arc::clone(state),
                Arc::clone(writer),
                client,
                server,
                handle,
                req.index_group(),
                req.index_offset(),
                req.length(),
                req.settings().cycle_time,
            );
            state
                .notifications
                .lock()
                .unwrap()
                .insert(handle, NotificationEntry { pusher });
            AddNotificationResponse::new(
                client,
                server,
                invoke_id,
                AdsReturnCode::Ok,
                NotificationHandle::new(handle),
            )
            .to_frame()
        }

        AdsCommand::DeleteDeviceNotification => {
            let req = DeleteNotificationRequest::try_from(frame).unwrap();
            // removal alone stops the pusher: it re-checks membership every
            // cycle, so it never gets cancelled mid-write
            let result = match state
                .notifications
                .lock()
                .unwrap()
                .remove(&req.handle().as_u32())
            {
                Some(_) => AdsReturnCode::Ok,
                None => AdsReturnCode::DeviceNotifyHandleInvalid,
            };
            DeleteNotificationResponse::new(client, server, invoke_id, result).to_frame()
        }

        _ => return,
    };

    let _ = writer.lock().await.write_frame(&reply).await;
}

fn do_read(state: &PeerState, group: u32, offset: u32, length: u32) -> (AdsReturnCode, Vec<u8>) {
    let (group, offset) = if group == SYM_VALBYHND {
        match state.value_handles.lock().unwrap().get(&offset) {
            Some(&addr) => addr,
            None => return (AdsReturnCode::DeviceSymbolVersionInvalid, Vec::new()),
        }
    } else {
        (group, offset)
    };

    let registers = state.registers.lock().unwrap();
    match registers.get(&(group, offset)) {
        Some(bytes) => {
            let mut data = bytes.clone();
            data.truncate(length as usize);
            (AdsReturnCode::Ok, data)
        }
        None => (AdsReturnCode::DeviceInvalidGroup, Vec::new()),
    }
}

fn do_write(state: &PeerState, group: u32, offset: u32, data: &[u8]) -> AdsReturnCode {
    if group == SYM_RELEASEHND {
        if data.len() < 4 {
            return AdsReturnCode::DeviceInvalidSize;
        }
        let handle = u32::from_le_bytes(data[0..4].try_into().unwrap());
        return match state.value_handles.lock().unwrap().remove(&handle) {
            Some(_) => AdsReturnCode::Ok,
            None => AdsReturnCode::DeviceNotFound,
        };
    }

    let (group, offset) = if group == SYM_VALBYHND {
        match state.value_handles.lock().unwrap().get(&offset) {
            Some(&addr) => addr,
            None => return AdsReturnCode::DeviceSymbolVersionInvalid,
        }
    } else {
        (group, offset)
    };

    state
        .registers
        .lock()
        .unwrap()
        .insert((group, offset), data.to_vec());
    AdsReturnCode::Ok
}

fn do_read_write(
    state: &PeerState,
    group: u32,
    offset: u32,
    read_length: u32,
    data: &[u8],
) -> (AdsReturnCode, Vec<u8>) {
    match group {
        SYM_HNDBYNAME => {
            let name = decode_plc_string(data).into_owned();
            match state.symbol_addrs.lock().unwrap().get(&name) {
                Some(&addr) => {
                    let handle = state.next_handle.fetch_add(1, Ordering::Relaxed);
                    state.value_handles.lock().unwrap().insert(handle, addr);
                    (AdsReturnCode::Ok, handle.to_le_bytes().to_vec())
                }
                None => (AdsReturnCode::DeviceSymbolNotFound, Vec::new()),
            }
        }
        SUMUP_READ_WRITE => {
            // write payload: per-item 16-byte heads, then write data regions
            let item_count = offset as usize;
            let head_len = item_count * 16;
            if data.len() < head_len {
                return (AdsReturnCode::DeviceInvalidSize, Vec::new());
            }

            let mut heads = Vec::with_capacity(item_count);
            for i in 0..item_count {
                let at = i * 16;
                let group = u32::from_le_bytes(data[at..at + 4].try_into().unwrap());
                let offset = u32::from_le_bytes(data[at + 4..at + 8].try_into().unwrap());
                let rlen = u32::from_le_bytes(data[at + 8..at + 12].try_into().unwrap());
                let wlen =
                    u32::from_le_bytes(data[at + 12..at + 16].try_into().unwrap()) as usize;
                heads.push((group, offset, rlen, wlen));
            }

            let mut cursor = head_len;
            let mut results = Vec::with_capacity(item_count);
            for &(group, offset, rlen, wlen) in &heads {
                let write_data = &data[cursor..cursor + wlen];
                cursor += wlen;
                if wlen > 0 {
                    do_write(state, group, offset, write_data);
                }
                results.push(do_read(state, group, offset, rlen));
            }

            let mut body = Vec::new();
            for (result, data) in &results {
                body.extend_from_slice(&result.to_bytes());
                body.extend_from_slice(&(data.len() as u32).to_le_bytes());
            }
            for (_, data) in &results {
                body.extend_from_slice(data);
            }
            (AdsReturnCode::Ok, body)
        }
        SYM_VALBYHND => do_read(state, group, offset, read_length),
        _ => (AdsReturnCode::DeviceServiceNotSupported, Vec::new()),
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_pusher(
    state: Arc<PeerState>,
    writer: SharedWriter,
    client: AmsAddr,
    server: AmsAddr,
    handle: u32,
    group: u32,
    offset: u32,
    length: u32,
    cycle_time_100ns: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let cycle = Duration::from_nanos(cycle_time_100ns as u64 * 100).max(
            Duration::from_millis(1),
        );
        let mut tick = tokio::time::interval(cycle);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // skip the immediate first tick so samples are spaced by the cycle
        tick.tick().await;

        loop {
            tick.tick().await;
            if !state.notifications.lock().unwrap().contains_key(&handle) {
                return;
            }
            let (_, data) = do_read(&state, group, offset, length);
            let stamp = NotificationStampOwned::new(
                WindowsFileTime::now(),
                vec![NotificationSampleOwned::new(
                    NotificationHandle::new(handle),
                    data,
                )],
            );
            let push = DeviceNotificationOwned::new(client, server, vec![stamp]);
            if writer.lock().await.write_frame(&push.to_frame()).await.is_err() {
                return;
            }
        }
    })
}
