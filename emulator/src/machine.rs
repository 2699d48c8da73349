
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::Clock;
use crate::cpu::Cpu;
use crate::interrupt::InterruptController;
use crate::io::keyboard::{self, Keyboard};
use crate::io::{Console, StdConsole};
use crate::memory::Memory;
use crate::mmu::Mmu;

use log::debug;

/// The assembled machine: every hardware component wired together the way
/// power-on leaves it. The clock drives the processor first, then the
/// store, then the interrupt controller.
pub struct Machine {
    clock: Clock,
    cpu: Arc<Mutex<Cpu>>,
    memory: Arc<Mutex<Memory>>,
    controller: Arc<Mutex<InterruptController>>,
    keyboard: Arc<Mutex<Keyboard>>,
    halt: Arc<AtomicBool>,
}

impl Machine {
    pub fn new() -> Machine {
        Machine::with_console(Arc::new(StdConsole))
    }

    pub fn with_console(console: Arc<dyn Console>) -> Machine {
        debug!("sys: hardware initialization, begin");

        let halt = Arc::new(AtomicBool::new(false));
        let memory = Arc::new(Mutex::new(Memory::new()));
        let mmu = Mmu::new(memory.clone());
        let cpu = Arc::new(Mutex::new(Cpu::new(mmu, console, halt.clone())));

        let controller = Arc::new(Mutex::new(InterruptController::new(Arc::downgrade(&cpu))));
        let keyboard = Arc::new(Mutex::new(Keyboard::new()));
        controller.lock().unwrap().register(keyboard.clone());

        let mut clock = Clock::new(halt.clone());
        // Processor first: the halt line it raises must be observable
        // before the tick ends.
        clock.add_listener(cpu.clone());
        clock.add_listener(memory.clone());
        clock.add_listener(controller.clone());

        debug!("sys: hardware initialization, complete");
        Machine {
            clock,
            cpu,
            memory,
            controller,
            keyboard,
            halt,
        }
    }

    /// Loads a program image and logs the flashed region for verification.
    pub fn flash(&self, origin: u16, image: &[u8]) {
        let mut cpu = self.cpu.lock().unwrap();
        cpu.mmu_mut().flash(origin, image);

        if !image.is_empty() {
            let hi = origin + (image.len() - 1) as u16;
            for line in cpu.mmu().dump(origin, hi).lines() {
                debug!("sys: {line}");
            }
        }
    }

    /// Applies power: arms the clock at the given pulse interval. Rejected
    /// when already running.
    pub fn boot(&mut self, interval: Duration) -> bool {
        debug!("sys: applying power");
        self.clock.start(interval)
    }

    /// Blocks until the halt opcode stops the clock.
    pub fn wait_halt(&mut self) {
        self.clock.wait_halt();
    }

    /// One deterministic tick. Returns false once the machine has halted.
    pub fn step(&mut self) -> bool {
        self.clock.tick()
    }

    pub fn stop(&mut self) -> bool {
        self.clock.stop()
    }

    pub fn halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }

    pub fn cpu(&self) -> MutexGuard<'_, Cpu> {
        self.cpu.lock().unwrap()
    }

    pub fn controller(&self) -> MutexGuard<'_, InterruptController> {
        self.controller.lock().unwrap()
    }

    pub fn keyboard(&self) -> MutexGuard<'_, Keyboard> {
        self.keyboard.lock().unwrap()
    }

    /// Scripted keystroke: buffers the byte on the keyboard and submits the
    /// request, exactly as the capture thread would.
    pub fn inject_key(&self, byte: u8) {
        let request = self.keyboard.lock().unwrap().press(byte);
        self.controller.lock().unwrap().submit(request);
    }

    /// Attaches the hosting terminal as the live keyboard.
    pub fn attach_terminal(&self) {
        keyboard::spawn_capture(self.keyboard.clone(), self.controller.clone());
    }

    /// Diagnostic peek; reads the snapshot, never the register pair.
    pub fn read_cell(&self, addr: u16) -> u8 {
        self.memory.lock().unwrap().snapshot()[addr as usize]
    }

    pub fn dump(&self, lo: u16, hi: u16) -> String {
        self.cpu.lock().unwrap().mmu().dump(lo, hi)
    }

    /// Power-on state without rebuilding the hardware graph.
    pub fn reset(&mut self) {
        self.cpu.lock().unwrap().reset();
        self.memory.lock().unwrap().reset();
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
