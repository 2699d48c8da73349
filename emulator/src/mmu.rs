
use std::sync::{Arc, Mutex};

use common::constants::MEMORY_SIZE;
use common::misc::ToU16P;

use crate::memory::Memory;

use log::{debug, trace};

/// Mediates every processor access to the store's MAR/MDR port and
/// reassembles two-byte little-endian operands delivered across consecutive
/// cycles.
pub struct Mmu {
    memory: Arc<Mutex<Memory>>,
    pending_low: Option<u8>,
}

impl Mmu {
    pub fn new(memory: Arc<Mutex<Memory>>) -> Mmu {
        Mmu {
            memory,
            pending_low: None,
        }
    }

    /// Direct single-cycle addressing.
    pub fn set_address(&mut self, addr: u16) {
        self.memory.lock().unwrap().set_mar(addr);
    }

    /// Two-call protocol for two-cycle operands. The first call stashes
    /// `half` as the low byte and yields nothing; the second combines the
    /// stash with `half` as the high byte, loads the assembled address into
    /// the MAR, and returns it.
    pub fn combine_little_endian(&mut self, half: u8) -> Option<u16> {
        match self.pending_low.take() {
            None => {
                self.pending_low = Some(half);
                None
            }
            Some(lo) => {
                let addr = u16::from_le_bytes([lo, half]);
                trace!("mmu: assembled {addr:#06X} from {lo:#04X}/{half:#04X}");
                self.memory.lock().unwrap().set_mar(addr);
                Some(addr)
            }
        }
    }

    /// True while a low byte is staged and the high byte has yet to arrive.
    pub fn combination_in_flight(&self) -> bool {
        self.pending_low.is_some()
    }

    /// Store read; the value settles in the MDR.
    pub fn read(&mut self) {
        self.memory.lock().unwrap().read();
    }

    /// Current MDR contents.
    pub fn data(&self) -> u8 {
        self.memory.lock().unwrap().mdr()
    }

    /// Single-cycle read: store read plus MDR fetch.
    pub fn read_byte(&mut self) -> u8 {
        let mut memory = self.memory.lock().unwrap();
        memory.read();
        memory.mdr()
    }

    /// Latches a value in the MDR ahead of a `write_byte`.
    pub fn stage_byte(&mut self, val: u8) {
        self.memory.lock().unwrap().set_mdr(val);
    }

    /// Store write of whatever was last staged.
    pub fn write_byte(&mut self) {
        self.memory.lock().unwrap().write();
    }

    /// Bulk image load, used once at boot.
    pub fn flash(&mut self, origin: u16, image: &[u8]) {
        let end = origin as usize + image.len();
        assert!(
            end <= MEMORY_SIZE,
            "mmu: image of {} bytes at {origin:#06X} runs past the top of memory",
            image.len(),
        );

        let mut memory = self.memory.lock().unwrap();
        for (i, byte) in image.iter().enumerate() {
            memory.set_mar(origin + i.to_u16p());
            memory.set_mdr(*byte);
            memory.write();
        }
        debug!("mmu: flashed {} bytes at {origin:#06X}", image.len());
    }

    /// Inclusive listing of cells [lo, hi], one line per address. Reads the
    /// snapshot rather than the register pair so diagnostics never disturb
    /// machine state.
    pub fn dump(&self, lo: u16, hi: u16) -> String {
        assert!(lo <= hi, "mmu: dump range {lo:#06X}..{hi:#06X} is inverted");

        let memory = self.memory.lock().unwrap();
        let cells = memory.snapshot();
        let mut out = String::new();
        for addr in lo..=hi {
            out.push_str(&format!(
                "{:#06X} | {:#04X}\n",
                addr, cells[addr as usize]
            ));
        }
        out
    }
}
