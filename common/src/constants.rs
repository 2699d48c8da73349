
pub const MEMORY_SIZE: usize = 0x1_0000; // Cells
pub const MEM_HIGH: u16 = 0xFFFF;

// Programs are flashed here unless the embedder says otherwise.
pub const PROGRAM_ORIGIN: u16 = 0x0000;

// Region listed by the halt-time diagnostic dump.
pub const HALT_DUMP_HIGH: u16 = 0x00FF;

// System-call modes, selected by the x register.
pub const SYS_PRINT_REG: u8 = 1;
pub const SYS_PRINT_STR: u8 = 2;
