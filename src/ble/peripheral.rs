//! Advertising and the per-connection loop.

use defmt::{debug, info, warn};
use embassy_futures::select::{select, select3, Either3};
use embassy_time::{Instant, Timer};
use nrf_softdevice::ble::{gatt_server, peripheral, Connection};
use nrf_softdevice::{raw, Softdevice};
use pony_keeb::ble::adv_data;
use pony_keeb::hid::{PendingReport, Retry};
use pony_keeb::config::{
    PowerProfile, BLE_ADV_INTERVAL, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN,
    BLE_SUP_TIMEOUT, DEVICE_NAME, FULL_SPEED_PROFILE,
};

use crate::ble::bonder::Bonder;
use crate::ble::hid_service::{HidServiceEvent, Server, ServerEvent};
use crate::ble::{set_connected, PROFILE, REPORTS, SUBSCRIBED};
use crate::error::{BleError, Error};

/// Back-off after an advertising failure before retrying.
const ADVERTISE_RETRY_MS: u64 = 1_000;

fn conn_params(profile: PowerProfile) -> raw::ble_gap_conn_params_t {
    raw::ble_gap_conn_params_t {
        min_conn_interval: BLE_CONN_INTERVAL_MIN,
        max_conn_interval: BLE_CONN_INTERVAL_MAX,
        slave_latency: profile.peripheral_latency,
        conn_sup_timeout: BLE_SUP_TIMEOUT,
    }
}

/// Advertise until a host connects.
async fn advertise(sd: &'static Softdevice, bonder: &'static Bonder) -> Result<Connection, Error> {
    let adv = adv_data::advertisement();
    let scan = adv_data::scan_response(DEVICE_NAME);

    let config = peripheral::Config {
        interval: BLE_ADV_INTERVAL,
        ..Default::default()
    };
    let advertisement = peripheral::ConnectableAdvertisement::ScannableUndirected {
        adv_data: &adv,
        scan_data: &scan,
    };

    peripheral::advertise_pairable(sd, advertisement, &config, bonder)
        .await
        .map_err(|e| {
            warn!("[BLE] advertising failed: {:?}", e);
            Error::Ble(BleError::AdvertiseFailed)
        })
}

/// Forward queued keyboard reports to the host, in order.
///
/// A report the host cannot take yet (link not encrypted, notifications
/// off) is retried until the host subscribes or its hold time runs out.
async fn pump_reports(conn: &Connection, server: &Server) -> ! {
    loop {
        let pending = PendingReport::new(REPORTS.receive().await, Instant::now().as_millis());
        loop {
            let Err(e) = server.hid.send(conn, pending.report()) else {
                break;
            };
            match pending.after_failure(Instant::now().as_millis()) {
                Retry::After(ms) => {
                    debug!("[BLE] host not listening yet, holding report");
                    select(SUBSCRIBED.wait(), Timer::after_millis(ms)).await;
                }
                Retry::GiveUp => {
                    warn!("[BLE] dropped report: {}", e);
                    break;
                }
            }
        }
    }
}

/// Apply power profile changes requested by the control loop.
async fn apply_profiles(conn: &Connection) -> ! {
    loop {
        let profile = PROFILE.wait().await;
        match conn.set_conn_params(conn_params(profile)) {
            Ok(()) => info!("[BLE] peripheral latency -> {}", profile.peripheral_latency),
            Err(e) => warn!(
                "[BLE] {}: {:?}",
                Error::Ble(BleError::ConnParamsFailed),
                defmt::Debug2Format(&e)
            ),
        }
    }
}

/// Advertise, serve one host until it disconnects, repeat.
#[embassy_executor::task]
pub async fn peripheral_task(
    sd: &'static Softdevice,
    server: &'static Server,
    bonder: &'static Bonder,
) -> ! {
    loop {
        info!("[BLE] advertising as {}", DEVICE_NAME);
        let conn = match advertise(sd, bonder).await {
            Ok(conn) => conn,
            Err(_) => {
                Timer::after_millis(ADVERTISE_RETRY_MS).await;
                continue;
            }
        };

        // Signals raised for the previous link are stale.
        PROFILE.reset();
        SUBSCRIBED.reset();
        if let Err(e) = conn.set_conn_params(conn_params(FULL_SPEED_PROFILE)) {
            warn!("[BLE] initial conn params rejected: {:?}", defmt::Debug2Format(&e));
        }
        set_connected(true);
        info!("[BLE] host connected");

        let gatt = gatt_server::run(&conn, server, |event| match event {
            ServerEvent::Bas(_) => {}
            ServerEvent::Hid(e) => {
                let subscribed = matches!(e, HidServiceEvent::InputReportCccdWrite { notifications: true });
                server.hid.on_event(e);
                if subscribed {
                    bonder.store_sys_attrs(&conn);
                    SUBSCRIBED.signal(());
                }
            }
        });

        match select3(gatt, pump_reports(&conn, server), apply_profiles(&conn)).await {
            Either3::First(reason) => info!("[BLE] host disconnected: {:?}", defmt::Debug2Format(&reason)),
            Either3::Second(never) | Either3::Third(never) => match never {},
        }
        set_connected(false);
    }
}
