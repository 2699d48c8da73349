use std::sync::Arc;
use std::time::Duration;

use emu_lib::io::PipeConsole;
use emu_lib::{Machine, PipelineStep};

fn machine_with(image: &[u8]) -> Machine {
    let machine = Machine::with_console(Arc::new(PipeConsole::default()));
    machine.flash(0, image);
    machine
}

/// Drives the clock until the halt opcode lands, with a safety bound.
fn run_to_halt(machine: &mut Machine, bound: usize) {
    for _ in 0..bound {
        if !machine.step() {
            return;
        }
    }
    panic!("machine did not halt within {bound} ticks");
}

#[test]
fn lda_immediate_timing() {
    // lda #$05, brk: fetch/decode/execute per opcode, three ticks each.
    let mut machine = machine_with(&[0xA9, 0x05, 0x00]);

    for _ in 0..3 {
        machine.step();
    }
    {
        let cpu = machine.cpu();
        assert_eq!(cpu.acc(), 0x05);
        assert_eq!(cpu.step(), PipelineStep::Fetch);
        assert!(!machine.halted());
    }

    assert!(machine.step()); // fetch brk
    assert!(machine.step()); // decode
    assert!(!machine.step()); // execute raises the halt line
    assert!(machine.halted());
    assert_eq!(machine.cpu().step(), PipelineStep::Halted);
}

#[test]
fn halt_stops_the_clock() {
    let mut machine = machine_with(&[0xA9, 0x05, 0x00]);

    assert!(machine.boot(Duration::from_millis(1)));
    // Double-start is rejected, not an error.
    assert!(!machine.boot(Duration::from_millis(1)));

    machine.wait_halt();
    assert!(machine.halted());
    assert_eq!(machine.cpu().acc(), 0x05);

    // The clock stopped itself; no further pulses arrive.
    let ticks = machine.ticks();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(machine.ticks(), ticks);
}

#[test]
fn stop_is_unconditional() {
    let mut machine = machine_with(&[0xEA, 0xEA, 0x00]);
    assert!(machine.stop());

    assert!(machine.boot(Duration::from_millis(1)));
    assert!(machine.stop());
}

#[test]
fn nop_and_unrecognized_opcodes_fall_back_to_fetch() {
    // nop, junk byte, brk. The junk byte is logged and skipped, never fatal.
    let mut machine = machine_with(&[0xEA, 0x42, 0x00]);

    run_to_halt(&mut machine, 16);
    assert!(machine.halted());
    assert_eq!(machine.ticks(), 7);
}

#[test]
fn store_reaches_memory_through_writeback() {
    // lda #$2A, sta $0010, brk.
    let mut machine = machine_with(&[0xA9, 0x2A, 0x8D, 0x10, 0x00, 0x00]);

    run_to_halt(&mut machine, 32);
    assert_eq!(machine.read_cell(0x0010), 0x2A);
    assert_eq!(machine.ticks(), 11);
}

#[test]
fn absolute_load_round_trips_through_store() {
    // lda #$77, sta $0030, lda #$00, lda $0030, brk.
    let mut machine = machine_with(&[
        0xA9, 0x77, // lda #$77
        0x8D, 0x30, 0x00, // sta $0030
        0xA9, 0x00, // lda #$00
        0xAD, 0x30, 0x00, // lda $0030
        0x00, // brk
    ]);

    run_to_halt(&mut machine, 64);
    assert_eq!(machine.cpu().acc(), 0x77);
}

#[test]
fn pipeline_returns_to_fetch_for_every_opcode() {
    // One instruction of each class; the pipeline must pass through fetch
    // between all of them and halt at the end.
    let image = vec![
        0xA9, 0x01, // lda #$01
        0xA2, 0x01, // ldx #$01
        0xA0, 0x09, // ldy #$09
        0x8D, 0x40, 0x00, // sta $0040
        0x6D, 0x40, 0x00, // adc $0040
        0xEE, 0x40, 0x00, // inc $0040
        0xEC, 0x40, 0x00, // cpx $0040
        0xD0, 0x01, // bne +1 (skips the nop)
        0xEA, // nop
        0xFF, // sys: print the y register
        0x00, // brk
    ];
    let mut machine = machine_with(&image);

    run_to_halt(&mut machine, 256);
    assert!(machine.halted());

    let cpu = machine.cpu();
    assert_eq!(cpu.acc(), 0x02);
    // inc made the cell 2, x is 1: flag is the signed difference.
    assert_eq!(cpu.compare_flag(), -1);
    assert_eq!(machine.read_cell(0x0040), 0x02);
}
