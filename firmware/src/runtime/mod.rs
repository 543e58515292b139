use core::cell::RefCell;

use cortex_m::interrupt as cortex_interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::peripherals::TIM3;
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::Timer;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use ranging_core::consumer::{RangingConsumer, Reading};
use ranging_core::handshake::SampleCell;
use ranging_core::ranging::RangingStateMachine;
use ranging_core::timing::RangingConfig;

use crate::hw::{HardwareTransceiver, IndicatorPanel};
use crate::readings::READING_QUEUE_DEPTH;
use crate::{status, telemetry};

mod consumer_task;
mod indicator_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        cortex_interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                cortex_interrupt::enable();
            }
        }
    }
}

/// Checked at compile time so a bad constant never reaches the board.
const CONFIG: RangingConfig = match RangingConfig::DEFAULT.validate() {
    Ok(config) => config,
    Err(_) => panic!("invalid ranging configuration"),
};

pub type ReadingChannel = Channel<CriticalSectionRawMutex, Reading, READING_QUEUE_DEPTH>;
pub type ReadingSender = Sender<'static, CriticalSectionRawMutex, Reading, READING_QUEUE_DEPTH>;
pub type ReadingReceiver = Receiver<'static, CriticalSectionRawMutex, Reading, READING_QUEUE_DEPTH>;

/// Timer plus state machine, owned by the tick interrupt once installed.
struct TickSource {
    timer: Timer<'static, TIM3>,
    ranger: RangingStateMachine<'static, HardwareTransceiver<'static>>,
}

static SAMPLES: SampleCell = SampleCell::new();
static READINGS: ReadingChannel = Channel::new();
static TICK_SOURCE: Mutex<CriticalSectionRawMutex, RefCell<Option<TickSource>>> =
    Mutex::new(RefCell::new(None));

#[interrupt]
fn TIM3_TIM4() {
    TICK_SOURCE.lock(|slot| {
        if let Some(source) = slot.borrow_mut().as_mut() {
            source.timer.clear_update_interrupt();
            let outcome = source.ranger.tick();
            status::record_state(source.ranger.state());
            if let Some(outcome) = outcome {
                status::record_outcome(outcome);
            }
        }
    });
}

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA6,
        PA7,
        PB5,
        PB6,
        PB8,
        PB10,
        TIM3,
        ..
    } = hal::init(config);

    telemetry::log_boot(&CONFIG);

    let transceiver = HardwareTransceiver::new(
        Output::new(PA6, Level::Low, Speed::VeryHigh),
        Input::new(PA7, Pull::Down),
    );
    let panel = IndicatorPanel::new(
        Output::new(PB5, Level::High, Speed::Low),
        Output::new(PB6, Level::High, Speed::Low),
        Output::new(PB8, Level::Low, Speed::Low),
        Output::new(PB10, Level::Low, Speed::Low),
    );
    let fan_button = Input::new(PA0, Pull::Up);

    let timer = Timer::new(TIM3);
    timer.set_frequency(Hertz(CONFIG.quantum.frequency_hz()));
    timer.enable_update_interrupt(true);
    timer.start();

    TICK_SOURCE.lock(|slot| {
        *slot.borrow_mut() = Some(TickSource {
            timer,
            ranger: RangingStateMachine::new(transceiver, CONFIG, &SAMPLES),
        });
    });

    interrupt::TIM3_TIM4.set_priority(Priority::P0);
    // The ISR only runs once the source is installed.
    unsafe { interrupt::TIM3_TIM4.enable() };

    spawner
        .spawn(consumer_task::run(
            RangingConsumer::new(&SAMPLES, CONFIG),
            READINGS.sender(),
        ))
        .expect("failed to spawn consumer task");

    spawner
        .spawn(indicator_task::run(
            panel,
            fan_button,
            READINGS.receiver(),
        ))
        .expect("failed to spawn indicator task");

    core::future::pending::<()>().await;
}
