//! pony-keeb - battery-powered BLE HID keyboard firmware (nRF52840 + S140).
//!
//! Boot sequence:
//! 1. Read the wake cause, light the boot LED, sample the buttons.
//! 2. Enable the SoftDevice, load bonds from flash.
//! 3. Run the controller's boot path (bond reset, wake replay).
//! 4. Start advertising and enter the control loop.
//!
//! All timing decisions are made by `pony_keeb::Controller`; this file
//! only samples inputs, carries out effects and obeys the returned flow.

#![no_std]
#![no_main]

mod ble;
mod error;
mod power;
mod sleep;
mod storage;
mod ui;

use defmt::{debug, info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::Pin;
use embassy_nrf::interrupt::Priority;
use embassy_time::{Instant, Timer};
use nrf_softdevice::Softdevice;
use panic_probe as _;
use pony_keeb::config::{ACTIVE_CONFIG, DEVICE_NAME, LONG_PRESS_MS};
use pony_keeb::{Controller, Effect, Event, Flow, PowerState, TickInputs};
use static_cell::StaticCell;

use crate::ble::bonder::Bonder;
use crate::ble::hid_service::Server;
use crate::ui::{Board, BoardPins};

static SERVER: StaticCell<Server> = StaticCell::new();
static BONDER: StaticCell<Bonder> = StaticCell::new();

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

fn log_event(event: &Event) {
    match *event {
        Event::LinkUp => info!("[BLE] Connected"),
        Event::LinkDown => info!("[BLE] Disconnected, waiting for host"),
        Event::PowerSavingOn { idle_ms } => {
            info!("[PWR] No key press for {} ms, entering power saving", idle_ms)
        }
        Event::PowerSavingOff => info!("[PWR] Activity, back to full speed"),
        Event::IdleTimeout { idle_ms } => {
            info!("[PWR] No key press for {} ms, going to sleep", idle_ms)
        }
        Event::NoHostTimeout { elapsed_ms } => {
            info!("[PWR] Disconnected for {} ms, going to sleep", elapsed_ms)
        }
        Event::Released { line, held_ms } => debug!(
            "[BTN] {} released after {} ms, need {} ms",
            line, held_ms, LONG_PRESS_MS
        ),
        Event::KeystrokeDropped { line } => warn!("[BTN] {} press dropped, no host", line),
        Event::WakeReplay { line } => info!("[BTN] {} woke the device, sending key", line),
        Event::BondReset(trigger) => warn!("[BLE] Clearing all bonds ({})", trigger),
    }
}

async fn apply_effects(board: &mut Board<'_>, effects: &[Effect]) {
    for effect in effects {
        match *effect {
            Effect::LinkIndicator(on) => board.set_link_led(on),
            Effect::ApplyPower(state) => {
                if let Err(e) = power::apply(state) {
                    warn!("[PWR] applying {} failed: {}", state, e);
                }
            }
            Effect::Keystroke(code) => {
                board.keystroke(code).await;
                info!("[HID] Key sent");
            }
            Effect::ClearBonds => storage::erase_all_bonds().await,
            Effect::Blink(pattern) => board.blink(pattern).await,
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);

    let wake = sleep::take_wake_cause();

    let mut board = Board::new(BoardPins {
        boot_led: p.P0_13.degrade(),
        link_led: p.P0_14.degrade(),
        confirm_led: p.P0_15.degrade(),
        action: p.P0_11.degrade(),
        config: p.P0_12.degrade(),
    });
    board.set_boot_led(true);

    info!("=== {} v{} ===", DEVICE_NAME, env!("CARGO_PKG_VERSION"));
    let levels = board.levels();
    info!(
        "[BOOT] wake={} action={} config={}",
        wake, levels.action, levels.config
    );

    let sd = ble::enable_softdevice();
    let server = SERVER.init(unwrap!(Server::new(sd)));
    let sd: &'static Softdevice = sd;
    let bonder: &'static Bonder = BONDER.init(Bonder::new());

    unwrap!(spawner.spawn(ble::softdevice_task(sd)));
    power::init();
    if let Err(e) = power::apply(PowerState::FullSpeed) {
        warn!("[PWR] initial power mode failed: {}", e);
    }

    unwrap!(spawner.spawn(storage::storage_task(sd, bonder)));
    storage::LOADED.wait().await;
    info!("[BLE] {} bonded host(s)", bonder.bond_count());

    let (mut controller, report) = Controller::boot(ACTIVE_CONFIG, wake, levels, now_ms());
    report.events.iter().for_each(log_event);
    apply_effects(&mut board, &report.effects).await;

    unwrap!(spawner.spawn(ble::peripheral::peripheral_task(sd, server, bonder)));
    controller.advertising_started(now_ms());

    let wake_line = controller.config().wake_line;

    loop {
        let inputs = TickInputs {
            connected: ble::is_connected(),
            buttons: board.levels(),
        };
        let report = controller.tick(inputs, now_ms());
        report.events.iter().for_each(log_event);
        apply_effects(&mut board, &report.effects).await;

        match report.flow {
            Flow::Continue { poll_after_ms } => Timer::after_millis(poll_after_ms).await,
            Flow::DeepSleep => sleep::enter_deep_sleep(&mut board, wake_line),
            Flow::Restart => sleep::restart(),
        }
    }
}
