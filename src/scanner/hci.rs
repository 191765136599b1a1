//! Raw HCI socket backend for BThome scanning.
//!
//! This backend uses raw Linux HCI sockets to scan for BLE advertisements
//! without requiring the BlueZ daemon. It requires CAP_NET_RAW and
//! CAP_NET_ADMIN capabilities or root privileges.

use super::{
    EVENT_CHANNEL_BUFFER_SIZE, MANUFACTURER_DATA_TYPE, ScanConfig, ScanError, ScanEvent, classify,
};
use crate::advertisement::Advertisement;
use crate::mac_address::MacAddress;
use libc::{AF_BLUETOOTH, SOCK_CLOEXEC, SOCK_NONBLOCK, SOCK_RAW, c_int, c_void, sockaddr, socklen_t};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::SystemTime;
use tokio::io::unix::AsyncFd;
use tokio::sync::mpsc;

// HCI protocol constants
const BTPROTO_HCI: c_int = 1;
const SOL_HCI: c_int = 0;
const HCI_FILTER: c_int = 2;
const HCI_CHANNEL_RAW: u16 = 0;

// HCI packet types
const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;

// HCI events
const EVT_LE_META_EVENT: u8 = 0x3E;
const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;

// HCI commands
const OGF_LE_CTL: u16 = 0x08;
const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;

// Scan parameters: passive, 10ms interval and window (0.625ms units)
const LE_SCAN_PASSIVE: u8 = 0x00;
const LE_SCAN_INTERVAL: u16 = 0x0010;
const LE_SCAN_WINDOW: u16 = 0x0010;
const LE_PUBLIC_ADDRESS: u8 = 0x00;
const FILTER_POLICY_ACCEPT_ALL: u8 = 0x00;

// AD types
const AD_TYPE_SHORT_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;

/// Largest HCI event: 2 byte header + 255 byte payload + packet type
const HCI_MAX_EVENT_SIZE: usize = 258;

/// HCI socket address structure
#[repr(C)]
struct SockaddrHci {
    hci_family: u16,
    hci_dev: u16,
    hci_channel: u16,
}

/// HCI filter structure for raw sockets
#[repr(C)]
#[derive(Default)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << u32::from(ptype);
    }

    fn set_event(&mut self, event: u8) {
        let bit = usize::from(event);
        self.event_mask[bit / 32] |= 1 << (bit % 32);
    }
}

/// Build an HCI command packet
fn hci_command_packet(ogf: u16, ocf: u16, params: &[u8]) -> Vec<u8> {
    let opcode = (ogf << 10) | ocf;
    let mut packet = Vec::with_capacity(4 + params.len());
    packet.push(HCI_COMMAND_PKT);
    packet.extend_from_slice(&opcode.to_le_bytes());
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

/// LE Set Scan Parameters payload
fn scan_parameters() -> Vec<u8> {
    let mut params = vec![LE_SCAN_PASSIVE];
    params.extend_from_slice(&LE_SCAN_INTERVAL.to_le_bytes());
    params.extend_from_slice(&LE_SCAN_WINDOW.to_le_bytes());
    params.push(LE_PUBLIC_ADDRESS);
    params.push(FILTER_POLICY_ACCEPT_ALL);
    params
}

/// Map a negative libc return value to a `ScanError` mentioning `action`.
fn check(ret: isize, action: &str) -> Result<isize, ScanError> {
    if ret < 0 {
        Err(ScanError::Bluetooth(format!(
            "Failed to {action}: {}",
            io::Error::last_os_error()
        )))
    } else {
        Ok(ret)
    }
}

/// Open a non-blocking raw HCI socket bound to `dev_id`
fn open_hci_socket(dev_id: u16) -> Result<OwnedFd, ScanError> {
    let fd = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            SOCK_RAW | SOCK_CLOEXEC | SOCK_NONBLOCK,
            BTPROTO_HCI,
        )
    };
    check(fd as isize, "create HCI socket")?;
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let addr = SockaddrHci {
        hci_family: AF_BLUETOOTH as u16,
        hci_dev: dev_id,
        hci_channel: HCI_CHANNEL_RAW,
    };
    let ret = unsafe {
        libc::bind(
            fd.as_raw_fd(),
            &addr as *const SockaddrHci as *const sockaddr,
            mem::size_of::<SockaddrHci>() as socklen_t,
        )
    };
    check(ret as isize, "bind HCI socket")?;

    Ok(fd)
}

/// Only let LE meta events through to the socket
fn set_hci_filter(fd: &OwnedFd) -> Result<(), ScanError> {
    let mut filter = HciFilter::default();
    filter.set_ptype(HCI_EVENT_PKT);
    filter.set_event(EVT_LE_META_EVENT);

    let ret = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            SOL_HCI,
            HCI_FILTER,
            &filter as *const HciFilter as *const c_void,
            mem::size_of::<HciFilter>() as socklen_t,
        )
    };
    check(ret as isize, "set HCI filter")?;
    Ok(())
}

fn send_hci_command(fd: &OwnedFd, ocf: u16, params: &[u8]) -> Result<(), ScanError> {
    let packet = hci_command_packet(OGF_LE_CTL, ocf, params);
    let ret = unsafe {
        libc::write(
            fd.as_raw_fd(),
            packet.as_ptr() as *const c_void,
            packet.len(),
        )
    };
    check(ret, "send HCI command")?;
    Ok(())
}

/// Configure and enable passive LE scanning without duplicate filtering
fn enable_le_scan(fd: &OwnedFd) -> Result<(), ScanError> {
    send_hci_command(fd, OCF_LE_SET_SCAN_PARAMETERS, &scan_parameters())?;
    send_hci_command(fd, OCF_LE_SET_SCAN_ENABLE, &[0x01, 0x00])
}

/// Parse the first report of an LE advertising report event.
///
/// `event` starts at the HCI packet type byte. Returns `None` for anything
/// that is not a well-formed advertising report.
fn parse_advertising_report(event: &[u8]) -> Option<Advertisement> {
    // packet type, event code, parameter length, subevent
    let (header, report) = event.split_at_checked(4)?;
    if header[0] != HCI_EVENT_PKT
        || header[1] != EVT_LE_META_EVENT
        || header[3] != EVT_LE_ADVERTISING_REPORT
    {
        return None;
    }

    // num_reports(1) event_type(1) addr_type(1) addr(6) data_len(1) data(n) rssi(1)
    if report.first().copied().unwrap_or(0) == 0 || report.len() < 10 {
        return None;
    }

    let address = MacAddress::from_le_bytes(report[3..9].try_into().ok()?);
    let data_len = usize::from(report[9]);
    let ad_data = report.get(10..10 + data_len)?;
    let rssi = report.get(10 + data_len).map(|&rssi| i16::from(rssi as i8));

    let mut name = None;
    let mut manufacturer_data = BTreeMap::new();

    for (ad_type, value) in ad_structures(ad_data) {
        match ad_type {
            MANUFACTURER_DATA_TYPE if value.len() >= 2 => {
                let company_id = u16::from_le_bytes([value[0], value[1]]);
                manufacturer_data.insert(company_id, value[2..].to_vec());
            }
            AD_TYPE_COMPLETE_NAME => name = Some(String::from_utf8_lossy(value).into_owned()),
            AD_TYPE_SHORT_NAME if name.is_none() => {
                name = Some(String::from_utf8_lossy(value).into_owned())
            }
            _ => {}
        }
    }

    Some(Advertisement {
        address,
        name,
        rssi,
        manufacturer_data,
        timestamp: SystemTime::now(),
    })
}

/// Iterate over `(AD type, value)` pairs, stopping at the first malformed entry.
fn ad_structures(mut data: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    std::iter::from_fn(move || {
        let (&len, rest) = data.split_first()?;
        let len = usize::from(len);
        if len == 0 || rest.len() < len {
            return None;
        }
        let (structure, tail) = rest.split_at(len);
        data = tail;
        Some((structure[0], &structure[1..]))
    })
}

/// Start scanning for BThome devices using raw HCI sockets.
///
/// Opens a raw HCI socket on hci0, enables passive LE scanning and spawns a
/// task that turns advertising reports into scan events.
///
/// # Requirements
/// - CAP_NET_RAW and CAP_NET_ADMIN capabilities or root privileges
/// - An available HCI device (typically hci0)
pub async fn start_scan(config: ScanConfig) -> Result<mpsc::Receiver<ScanEvent>, ScanError> {
    let fd = open_hci_socket(0)?;
    set_hci_filter(&fd)?;

    // Commands go through a separate socket so the event filter stays intact
    let cmd_fd = open_hci_socket(0)?;
    enable_le_scan(&cmd_fd)?;
    debug!("passive LE scan enabled on hci0");

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

    let async_fd = AsyncFd::new(fd)
        .map_err(|e| ScanError::Bluetooth(format!("Failed to create async fd: {}", e)))?;

    tokio::spawn(async move {
        let _cmd_fd = cmd_fd;
        let mut buf = [0u8; HCI_MAX_EVENT_SIZE];

        loop {
            let mut guard = match async_fd.readable().await {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("HCI socket failed: {e}");
                    break;
                }
            };

            // Drain all available packets before waiting again
            loop {
                let n = match guard.try_io(|inner| {
                    let ret = unsafe {
                        libc::read(
                            inner.as_raw_fd(),
                            buf.as_mut_ptr() as *mut c_void,
                            buf.len(),
                        )
                    };
                    if ret < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(ret as usize)
                    }
                }) {
                    Ok(Ok(n)) if n > 0 => n,
                    Ok(Ok(_)) => break,
                    Ok(Err(e)) => {
                        warn!("HCI read failed: {e}");
                        break;
                    }
                    Err(_would_block) => break,
                };

                if let Some(event) = parse_advertising_report(&buf[..n])
                    .and_then(|advertisement| classify(advertisement, &config))
                    && tx.send(event).await.is_err()
                {
                    return;
                }
            }
        }
    });

    Ok(rx)
}
