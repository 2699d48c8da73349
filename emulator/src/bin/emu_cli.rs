
use std::time::Duration;

use common::constants::PROGRAM_ORIGIN;
use emu_lib::Machine;

use clap::Parser;

/// Clock-synchronized 8-bit machine emulator
#[derive(Parser)]
struct Args {
    /// Raw program image flashed at address 0 (defaults to a built-in demo).
    image: Option<String>,

    /// Milliseconds between clock pulses.
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,

    /// Attach the terminal as the interrupt-driven keyboard.
    #[arg(long)]
    keyboard: bool,
}

// Store a byte, print a banner and a register, halt. The string sits right
// after the code, at 0x10.
fn demo_image() -> Vec<u8> {
    let mut image = vec![
        0xA9, 0x02, // lda #$02
        0x8D, 0x20, 0x00, // sta $0020
        0xA2, 0x02, // ldx #$02
        0xFF, 0x10, 0x00, // sys: print the string at $0010
        0xA2, 0x01, // ldx #$01
        0xA0, 0x2A, // ldy #$2A
        0xFF, // sys: print the y register
        0x00, // brk
    ];
    image.extend_from_slice(b"hello, world!\n\0");
    image
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let image = match &args.image {
        Some(path) => std::fs::read(path).unwrap(),
        None => demo_image(),
    };

    let mut machine = Machine::new();
    machine.flash(PROGRAM_ORIGIN, &image);

    if args.keyboard {
        machine.attach_terminal();
    }

    machine.boot(Duration::from_millis(args.interval_ms));
    machine.wait_halt();

    if args.keyboard {
        // The capture thread may still hold the terminal in raw mode.
        crossterm::terminal::disable_raw_mode().ok();
    }
}
