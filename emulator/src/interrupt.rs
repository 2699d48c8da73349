
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use crate::clock::ClockListener;
use crate::cpu::Cpu;

use log::{debug, trace, warn};

/// Delivery urgency. Pending requests drain strictly highest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    None,
    Regular,
    High,
    VeryHigh,
}

impl Priority {
    /// Scan order for the per-tick drain.
    pub const DESCENDING: [Priority; 4] = [
        Priority::VeryHigh,
        Priority::High,
        Priority::Regular,
        Priority::None,
    ];
}

pub type PayloadQueue = Arc<Mutex<VecDeque<u8>>>;

/// Capability interface for hardware that can raise an interrupt. The
/// registry stores these as trait objects; any device that buffers events
/// and wants them delivered to the processor implements it.
pub trait InterruptSource: Send {
    /// Permanent number handed out at registration, used for logging only.
    fn irq(&self) -> Option<usize>;
    fn assign_irq(&mut self, irq: usize);
    fn priority(&self) -> Priority;
    fn name(&self) -> &str;
    fn payload(&self) -> PayloadQueue;

    /// Snapshot handle submitted to the controller per event. The payload
    /// queue is the source's own buffer, so re-submissions alias it.
    fn request(&self) -> InterruptRequest {
        let irq = self
            .irq()
            .expect("interrupt source raised a request before registration");
        InterruptRequest {
            irq,
            priority: self.priority(),
            name: self.name().to_owned(),
            payload: self.payload(),
        }
    }
}

/// One in-flight interrupt: identification plus a handle on the source's
/// payload buffer.
#[derive(Debug, Clone)]
pub struct InterruptRequest {
    pub irq: usize,
    pub priority: Priority,
    pub name: String,
    pub payload: PayloadQueue,
}

/// Collects pending requests from every registered source and, once per
/// clock pulse, hands at most one of them to the processor in strict
/// priority order. Models a single interrupt line.
pub struct InterruptController {
    registry: Vec<Arc<Mutex<dyn InterruptSource>>>,
    pending: Vec<InterruptRequest>,
    // Delivery handle only; the processor is owned elsewhere.
    cpu: Weak<Mutex<Cpu>>,
}

impl InterruptController {
    pub fn new(cpu: Weak<Mutex<Cpu>>) -> InterruptController {
        InterruptController {
            registry: Vec::new(),
            pending: Vec::new(),
            cpu,
        }
    }

    /// Appends the source to the registry and hands back its permanent IRQ
    /// number (the registry index).
    pub fn register(&mut self, source: Arc<Mutex<dyn InterruptSource>>) -> usize {
        let irq = self.registry.len();
        {
            let mut source = source.lock().unwrap();
            source.assign_irq(irq);
            debug!("irc: registered {} as irq {irq}", source.name());
        }
        self.registry.push(source);
        irq
    }

    /// Queues a request for a later pulse. Callers on a capture thread
    /// reach this through the controller's shared lock, so an append from
    /// outside the tick is visible to the next scan.
    pub fn submit(&mut self, request: InterruptRequest) {
        trace!("irc: request from irq {} ({})", request.irq, request.name);
        self.pending.push(request);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Highest-priority pending request with something left to deliver;
    /// submission order breaks ties. Requests whose payload has already
    /// drained through an aliased delivery are discarded.
    fn take_next(&mut self) -> Option<InterruptRequest> {
        for priority in Priority::DESCENDING {
            while let Some(pos) = self.pending.iter().position(|r| r.priority == priority) {
                let request = self.pending.remove(pos);
                if request.payload.lock().unwrap().is_empty() {
                    trace!("irc: dropping drained request from irq {}", request.irq);
                    continue;
                }
                return Some(request);
            }
        }
        None
    }
}

impl ClockListener for InterruptController {
    fn pulse(&mut self) {
        trace!("irc: pulse, {} pending", self.pending.len());

        // One request per tick; the rest wait for later pulses.
        let Some(request) = self.take_next() else {
            return;
        };
        let Some(cpu) = self.cpu.upgrade() else {
            warn!("irc: processor is gone, dropping irq {}", request.irq);
            return;
        };
        debug!(
            "irc: delivering irq {} ({}, {:?})",
            request.irq, request.name, request.priority
        );
        cpu.lock().unwrap().set_interrupt(request);
    }
}
