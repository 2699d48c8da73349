
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, trace};

/// Per-tick handler, driven by the clock.
pub trait ClockListener: Send {
    fn pulse(&mut self);
}

type Listeners = Vec<Arc<Mutex<dyn ClockListener>>>;

/// The sole timing source. Once per tick it pulses every registered
/// listener in registration order, then samples the halt line; the
/// processor must be registered first so the halt it raises is observed
/// before the tick ends.
///
/// A panic in any listener is fatal to the run. The pulse models a shared
/// electrical edge, not independent tasks, so there is no isolation.
pub struct Clock {
    listeners: Listeners,
    halt: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl Clock {
    pub fn new(halt: Arc<AtomicBool>) -> Clock {
        Clock {
            listeners: Vec::new(),
            halt,
            running: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    pub fn add_listener(&mut self, listener: Arc<Mutex<dyn ClockListener>>) {
        self.listeners.push(listener);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// One synchronous dispatch round. Returns false once the halt line is
    /// up. This is the deterministic driver used by tests and single-step
    /// runs; `start` drives the same round from a timer thread.
    pub fn tick(&self) -> bool {
        dispatch(&self.listeners, &self.ticks, &self.halt)
    }

    /// Arms the repeating timer. A second start while armed is rejected,
    /// not an error.
    pub fn start(&mut self, interval: Duration) -> bool {
        if self.worker.is_some() {
            debug!("clk: start rejected, already running");
            return false;
        }

        self.running.store(true, Ordering::SeqCst);
        let listeners = self.listeners.clone();
        let running = self.running.clone();
        let halt = self.halt.clone();
        let ticks = self.ticks.clone();
        self.worker = Some(thread::spawn(move || {
            debug!("clk: started, interval {interval:?}");
            while running.load(Ordering::SeqCst) {
                if !dispatch(&listeners, &ticks, &halt) {
                    debug!("clk: halt line raised, stopping");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                thread::sleep(interval);
            }
        }));
        true
    }

    /// Disarms unconditionally.
    pub fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        self.join_worker();
        true
    }

    /// Blocks until the halt line stops the timer.
    pub fn wait_halt(&mut self) {
        self.join_worker();
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                panic!("clk: a listener panicked during pulse dispatch");
            }
        }
    }
}

fn dispatch(listeners: &Listeners, ticks: &AtomicU64, halt: &AtomicBool) -> bool {
    let tick = ticks.fetch_add(1, Ordering::Relaxed) + 1;
    trace!("clk: pulse {tick}");
    for listener in listeners {
        listener.lock().unwrap().pulse();
    }
    !halt.load(Ordering::SeqCst)
}
