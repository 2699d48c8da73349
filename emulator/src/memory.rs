
use common::constants::MEMORY_SIZE;

use crate::clock::ClockListener;

use log::trace;

/// Flat byte-addressed storage behind a MAR/MDR register pair.
///
/// There is no indexed access from outside: every read and write goes
/// through the two registers, and only the MMU drives them. The cell array
/// is allocated once, up front.
pub struct Memory {
    mar: u16,
    mdr: u8,
    cells: Vec<u8>,
}

impl Memory {
    pub fn new() -> Memory {
        Memory {
            mar: 0,
            mdr: 0,
            cells: vec![0; MEMORY_SIZE],
        }
    }

    pub fn set_mar(&mut self, addr: u16) {
        self.mar = addr;
    }

    pub fn mar(&self) -> u16 {
        self.mar
    }

    pub fn set_mdr(&mut self, val: u8) {
        self.mdr = val;
    }

    pub fn mdr(&self) -> u8 {
        self.mdr
    }

    /// cells[MAR] -> MDR. The MAR is a u16, so the address cannot fall
    /// outside the cell array.
    pub fn read(&mut self) {
        self.mdr = self.cells[self.mar as usize];
        trace!("ram: read {:#04X} from {:#06X}", self.mdr, self.mar);
    }

    /// MDR -> cells[MAR].
    pub fn write(&mut self) {
        trace!("ram: writing {:#04X} to {:#06X}", self.mdr, self.mar);
        self.cells[self.mar as usize] = self.mdr;
    }

    pub fn reset(&mut self) {
        self.mar = 0;
        self.mdr = 0;
        self.cells.fill(0);
    }

    /// Read-only view of the whole array, for diagnostic dumps.
    pub fn snapshot(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockListener for Memory {
    // The store answers synchronously within the CPU's pulse; its own slot
    // just models powered hardware.
    fn pulse(&mut self) {
        trace!("ram: pulse");
    }
}
