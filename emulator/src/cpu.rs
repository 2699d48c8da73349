
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::constants::{HALT_DUMP_HIGH, SYS_PRINT_REG, SYS_PRINT_STR};
use common::opcodes::{Addressing, Opcode};

use crate::clock::ClockListener;
use crate::interrupt::InterruptRequest;
use crate::io::Console;
use crate::mmu::Mmu;

use log::{debug, trace, warn};

/// Stage the processor will run on its next pulse. Transitions happen only
/// inside the stage handlers; `Halted` is terminal for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Fetch,
    Decode,
    Execute,
    Writeback,
    Halted,
}

/// The execution engine. Every pulse advances exactly one pipeline stage;
/// multi-byte operands and memory settle times are spanned with a sub-cycle
/// counter rather than by doing more work per tick.
pub struct Cpu {
    ip: u16,
    ir: u8,
    acc: u8,
    x: u8,
    y: u8,
    compare_flag: i16,
    step: PipelineStep,
    sub_cycle: u8,
    opcode: Option<Opcode>,
    // Immediate/relative operand latch.
    operand: u8,
    // Resolved two-byte operand address.
    operand_addr: u16,
    // Return address while the print-string call borrows the ip.
    saved_ip: u16,
    pending_interrupt: Option<InterruptRequest>,
    halt: Arc<AtomicBool>,
    mmu: Mmu,
    console: Arc<dyn Console>,
    cycles: u64,
}

impl Cpu {
    pub fn new(mmu: Mmu, console: Arc<dyn Console>, halt: Arc<AtomicBool>) -> Cpu {
        Cpu {
            ip: 0,
            ir: 0,
            acc: 0,
            x: 0,
            y: 0,
            compare_flag: 0,
            step: PipelineStep::Fetch,
            sub_cycle: 0,
            opcode: None,
            operand: 0,
            operand_addr: 0,
            saved_ip: 0,
            pending_interrupt: None,
            halt,
            mmu,
            console,
            cycles: 0,
        }
    }

    pub fn reset(&mut self) {
        self.ip = 0;
        self.ir = 0;
        self.acc = 0;
        self.x = 0;
        self.y = 0;
        self.compare_flag = 0;
        self.step = PipelineStep::Fetch;
        self.sub_cycle = 0;
        self.opcode = None;
        self.operand = 0;
        self.operand_addr = 0;
        self.saved_ip = 0;
        self.pending_interrupt = None;
        self.halt.store(false, Ordering::SeqCst);
        self.cycles = 0;
    }

    pub fn ip(&self) -> u16 {
        self.ip
    }

    pub fn set_ip(&mut self, ip: u16) {
        self.ip = ip;
    }

    pub fn acc(&self) -> u8 {
        self.acc
    }

    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn compare_flag(&self) -> i16 {
        self.compare_flag
    }

    pub fn step(&self) -> PipelineStep {
        self.step
    }

    pub fn halted(&self) -> bool {
        self.step == PipelineStep::Halted
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }

    /// Delivery entry point for the interrupt controller. At most one
    /// undelivered request is held at a time.
    pub fn set_interrupt(&mut self, request: InterruptRequest) {
        if let Some(prev) = &self.pending_interrupt {
            debug!("cpu: replacing unserviced irq {} request", prev.irq);
        }
        self.pending_interrupt = Some(request);
    }

    pub fn pending_interrupt(&self) -> Option<&InterruptRequest> {
        self.pending_interrupt.as_ref()
    }

    /// Inline interrupt service, run after every stage: take the delivered
    /// request and drain exactly one payload element. No control transfer
    /// happens; the fetch target is untouched.
    fn check_interrupt(&mut self) {
        let Some(request) = self.pending_interrupt.take() else {
            return;
        };
        let mut payload = request.payload.lock().unwrap();
        match payload.pop_front() {
            Some(byte) => debug!(
                "cpu: serviced irq {} ({}), took {byte:#04X}, {} byte(s) buffered",
                request.irq,
                request.name,
                payload.len()
            ),
            None => trace!("cpu: irq {} arrived with a drained payload", request.irq),
        }
    }

    fn fetch(&mut self) {
        assert!(
            !self.mmu.combination_in_flight(),
            "cpu: little-endian combination left dangling across instructions"
        );

        self.mmu.set_address(self.ip);
        self.ir = self.mmu.read_byte();
        trace!("cpu: fetched {:#04X} at {:#06X}", self.ir, self.ip);
        self.ip = self.ip.wrapping_add(1);
        self.opcode = Opcode::decode(self.ir);
        self.sub_cycle = 0;
        self.step = PipelineStep::Decode;
    }

    fn decode(&mut self) {
        let Some(opcode) = self.opcode else {
            warn!(
                "cpu: unrecognized opcode {:#04X} at {:#06X}, treating as no-op",
                self.ir,
                self.ip.wrapping_sub(1)
            );
            self.step = PipelineStep::Fetch;
            return;
        };

        if opcode == Opcode::Nop {
            self.step = PipelineStep::Fetch;
            return;
        }

        // The system call's shape depends on its mode: print-register is
        // implied, print-string takes an absolute operand.
        let addressing = match opcode {
            Opcode::Sys if self.x == SYS_PRINT_STR => Addressing::Absolute,
            op => op.addressing(),
        };

        if addressing.is_implied() {
            self.step = PipelineStep::Execute;
        } else if addressing.is_absolute() {
            // Operand bytes arrive low-first over two pulses; the MMU keeps
            // the stash and loads the MAR when the high half lands.
            self.mmu.set_address(self.ip);
            let half = self.mmu.read_byte();
            self.ip = self.ip.wrapping_add(1);
            match self.mmu.combine_little_endian(half) {
                None => self.sub_cycle += 1,
                Some(addr) => {
                    trace!("cpu: {opcode} operand address {addr:#06X}");
                    self.operand_addr = addr;
                    self.sub_cycle = 0;
                    self.step = PipelineStep::Execute;
                }
            }
        } else {
            // Immediate and relative operands are one literal byte.
            self.mmu.set_address(self.ip);
            self.operand = self.mmu.read_byte();
            self.ip = self.ip.wrapping_add(1);
            self.step = PipelineStep::Execute;
        }
    }

    fn execute(&mut self) {
        use Opcode::*;

        let Some(opcode) = self.opcode else {
            warn!("cpu: execute pulse with no decoded opcode, returning to fetch");
            self.step = PipelineStep::Fetch;
            return;
        };

        match opcode {
            LdaImm => {
                self.acc = self.operand;
                self.finish();
            }
            LdxImm => {
                self.x = self.operand;
                self.finish();
            }
            LdyImm => {
                self.y = self.operand;
                self.finish();
            }
            LdaAbs => match self.sub_cycle {
                0 => {
                    // Read settles in the MDR; the transfer lands next pulse.
                    self.mmu.read();
                    self.sub_cycle = 1;
                }
                _ => {
                    self.acc = self.mmu.data();
                    self.finish();
                }
            },
            AdcAbs => {
                self.acc = self.acc.wrapping_add(self.mmu.read_byte());
                self.finish();
            }
            CpxAbs => match self.sub_cycle {
                0 => {
                    self.mmu.read();
                    self.sub_cycle = 1;
                }
                _ => {
                    let val = self.mmu.data();
                    // Signed difference; zero means equal.
                    self.compare_flag = self.x as i16 - val as i16;
                    self.finish();
                }
            },
            StaAbs => {
                self.mmu.stage_byte(self.acc);
                self.step = PipelineStep::Writeback;
            }
            IncAbs => match self.sub_cycle {
                0 => {
                    self.mmu.read();
                    self.sub_cycle = 1;
                }
                _ => {
                    let val = self.mmu.data();
                    self.mmu.stage_byte(val.wrapping_add(1));
                    self.step = PipelineStep::Writeback;
                }
            },
            Bne => {
                if self.compare_flag != 0 {
                    let target = self.ip.wrapping_add_signed((self.operand as i8) as i16);
                    trace!("cpu: branch taken to {target:#06X}");
                    self.ip = target;
                }
                self.finish();
            }
            Nop => self.finish(),
            Brk => {
                debug!("cpu: halt at {:#06X} after {} cycles", self.ip, self.cycles);
                for line in self.mmu.dump(0, HALT_DUMP_HIGH).lines() {
                    debug!("{line}");
                }
                self.halt.store(true, Ordering::SeqCst);
                self.step = PipelineStep::Halted;
            }
            Sys => self.execute_sys(),
        }
    }

    fn execute_sys(&mut self) {
        match self.x {
            SYS_PRINT_REG => {
                self.console.put(&format!("0x{:02X}", self.y));
                self.finish();
            }
            SYS_PRINT_STR => match self.sub_cycle {
                0 => {
                    // Borrow the ip as the string cursor; the saved value
                    // comes back at the terminator.
                    self.saved_ip = self.ip;
                    self.ip = self.operand_addr;
                    self.sub_cycle = 1;
                }
                _ => {
                    self.mmu.set_address(self.ip);
                    let byte = self.mmu.read_byte();
                    if byte == 0 {
                        self.ip = self.saved_ip;
                        self.finish();
                    } else {
                        self.console.put(char::from(byte).to_string().as_str());
                        self.ip = self.ip.wrapping_add(1);
                    }
                }
            },
            mode => {
                warn!("cpu: unknown system call mode {mode}, ignoring");
                self.finish();
            }
        }
    }

    // Writeback runs only for the store-class opcodes; the value was staged
    // during execute and the MAR still holds the resolved operand address.
    fn writeback(&mut self) {
        self.mmu.write_byte();
        self.finish();
    }

    fn finish(&mut self) {
        self.sub_cycle = 0;
        self.step = PipelineStep::Fetch;
    }
}

impl ClockListener for Cpu {
    fn pulse(&mut self) {
        self.cycles += 1;
        trace!(
            "cpu: pulse {}, step {:?}, sub-cycle {}",
            self.cycles, self.step, self.sub_cycle
        );

        match self.step {
            PipelineStep::Fetch => self.fetch(),
            PipelineStep::Decode => self.decode(),
            PipelineStep::Execute => self.execute(),
            PipelineStep::Writeback => self.writeback(),
            PipelineStep::Halted => {
                trace!("cpu: halted, ignoring pulse");
                return;
            }
        }

        self.check_interrupt();
    }
}
