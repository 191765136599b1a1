//! BlueZ D-Bus backend for BThome scanning.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running.
//!
//! Without `verbose` a passive advertisement monitor matching the BThome
//! company id is registered, so BlueZ does the filtering. With `verbose` the
//! adapter runs discovery instead, which also reports non-BThome devices.

use super::{
    BTHOME_COMPANY_ID_BYTES, EVENT_CHANNEL_BUFFER_SIZE, MANUFACTURER_DATA_TYPE, ScanConfig,
    ScanError, ScanEvent, classify,
};
use crate::advertisement::Advertisement;
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::StreamExt;
use log::{debug, warn};
use std::time::SystemTime;
use tokio::sync::mpsc;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Start scanning for BThome devices using the BlueZ D-Bus backend.
///
/// Powers on the default adapter and spawns a task that forwards matching
/// advertisements through the returned channel.
pub async fn start_scan(config: ScanConfig) -> Result<mpsc::Receiver<ScanEvent>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;
    debug!("using adapter {}", adapter.name());

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER_SIZE);

    if config.verbose {
        let filter = DiscoveryFilter {
            transport: DiscoveryTransport::Le,
            duplicate_data: true,
            ..Default::default()
        };
        if let Err(e) = adapter.set_discovery_filter(filter).await {
            warn!("Failed to set discovery filter: {e}");
        }

        let mut events = Box::pin(adapter.discover_devices_with_changes().await?);
        debug!("discovery started");

        tokio::spawn(async move {
            let _session = session;

            while let Some(event) = events.next().await {
                if let AdapterEvent::DeviceAdded(address) = event
                    && !forward(&adapter, address, &config, &tx).await
                {
                    break;
                }
            }
        });
    } else {
        let pattern = Pattern {
            data_type: MANUFACTURER_DATA_TYPE,
            start_position: 0,
            content: BTHOME_COMPANY_ID_BYTES.to_vec(),
        };

        let monitor_manager = adapter.monitor().await?;
        let mut monitor_handle = monitor_manager
            .register(Monitor {
                patterns: Some(vec![pattern]),
                ..Default::default()
            })
            .await?;
        debug!("advertisement monitor registered");

        // The task owns all Bluetooth state so it lives as long as the scan
        tokio::spawn(async move {
            let _session = session;
            let _monitor_manager = monitor_manager;

            while let Some(event) = monitor_handle.next().await {
                if let MonitorEvent::DeviceFound(device_id) = event
                    && !forward(&adapter, device_id.device, &config, &tx).await
                {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

/// Read, classify and send one device. Returns `false` once the receiver is gone.
async fn forward(
    adapter: &Adapter,
    address: Address,
    config: &ScanConfig,
    tx: &mpsc::Sender<ScanEvent>,
) -> bool {
    let advertisement = match read_advertisement(adapter, address).await {
        Ok(advertisement) => advertisement,
        Err(e) => {
            warn!("{address}: {e}");
            return true;
        }
    };

    match classify(advertisement, config) {
        Some(event) => tx.send(event).await.is_ok(),
        None => true,
    }
}

/// Snapshot the properties BlueZ cached for `address`.
async fn read_advertisement(
    adapter: &Adapter,
    address: Address,
) -> Result<Advertisement, ScanError> {
    let device = adapter.device(address)?;

    Ok(Advertisement {
        address: address.into(),
        name: device.name().await?,
        rssi: device.rssi().await?,
        manufacturer_data: device
            .manufacturer_data()
            .await?
            .unwrap_or_default()
            .into_iter()
            .collect(),
        timestamp: SystemTime::now(),
    })
}
