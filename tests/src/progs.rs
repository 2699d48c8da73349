use std::sync::Arc;

use emu_lib::io::PipeConsole;
use emu_lib::Machine;

fn machine_with(image: &[u8]) -> (Machine, Arc<PipeConsole>) {
    let console = Arc::new(PipeConsole::default());
    let machine = Machine::with_console(console.clone());
    machine.flash(0, image);
    (machine, console)
}

fn run_to_halt(machine: &mut Machine, bound: usize) {
    for _ in 0..bound {
        if !machine.step() {
            return;
        }
    }
    panic!("machine did not halt within {bound} ticks");
}

#[test]
fn accumulate_from_memory() {
    // lda #$10, adc $0020, brk; the addend is flashed with the image.
    let mut image = vec![0xA9, 0x10, 0x6D, 0x20, 0x00, 0x00];
    image.resize(0x20, 0x00);
    image.push(0x05);
    let (mut machine, _) = machine_with(&image);

    run_to_halt(&mut machine, 32);
    assert_eq!(machine.cpu().acc(), 0x15);
}

#[test]
fn count_to_three() {
    // Increment a counter until it matches x, then fall through to brk.
    let image = vec![
        0xA2, 0x03, // ldx #$03
        0xEE, 0x10, 0x00, // inc $0010
        0xEC, 0x10, 0x00, // cpx $0010
        0xD0, 0xF8, // bne back to the inc
        0x00, // brk
    ];
    let (mut machine, _) = machine_with(&image);

    run_to_halt(&mut machine, 256);
    assert_eq!(machine.read_cell(0x0010), 0x03);
    assert_eq!(machine.cpu().compare_flag(), 0);
}

#[test]
fn sys_prints_register_as_hex() {
    // ldx #$01, ldy #$7F, sys, brk.
    let (mut machine, console) = machine_with(&[0xA2, 0x01, 0xA0, 0x7F, 0xFF, 0x00]);

    run_to_halt(&mut machine, 32);
    assert_eq!(console.take_output(), "0x7F");
}

#[test]
fn sys_prints_zero_terminated_string() {
    // ldx #$02, sys $0010, brk; the string sits past the code.
    let mut image = vec![0xA2, 0x02, 0xFF, 0x10, 0x00, 0x00];
    image.resize(0x10, 0x00);
    image.extend_from_slice(b"ok\n\0");
    let (mut machine, console) = machine_with(&image);

    run_to_halt(&mut machine, 64);
    assert_eq!(console.take_output(), "ok\n");

    // The instruction pointer came back from the string walk: it must sit
    // one past the brk that fetched last.
    assert_eq!(machine.cpu().ip(), 0x0006);
}

#[test]
fn string_walk_is_one_byte_per_tick() {
    let mut image = vec![0xA2, 0x02, 0xFF, 0x10, 0x00, 0x00];
    image.resize(0x10, 0x00);
    image.extend_from_slice(b"ok\n\0");
    let (mut machine, _) = machine_with(&image);

    // ldx: 3 ticks. sys: fetch, two decode pulses for the address, one
    // execute pulse to redirect, one per character, one for the
    // terminator. brk: 3 ticks.
    run_to_halt(&mut machine, 64);
    assert_eq!(machine.ticks(), 14);
}

#[test]
fn keystrokes_drain_one_per_tick_while_running() {
    // A program long enough to outlive the injected keystrokes.
    let image = vec![
        0xA2, 0x03, // ldx #$03
        0xEE, 0x10, 0x00, // inc $0010
        0xEC, 0x10, 0x00, // cpx $0010
        0xD0, 0xF8, // bne back to the inc
        0x00, // brk
    ];
    let (mut machine, _) = machine_with(&image);

    machine.inject_key(b'a');
    machine.inject_key(b'b');
    assert_eq!(machine.keyboard().buffered(), 2);
    assert_eq!(machine.controller().pending_len(), 2);

    // Tick 1 delivers the first request; tick 2 services it and delivers
    // the second; tick 3 services that one.
    machine.step();
    assert_eq!(machine.keyboard().buffered(), 2);
    machine.step();
    assert_eq!(machine.keyboard().buffered(), 1);
    machine.step();
    assert_eq!(machine.keyboard().buffered(), 0);

    // Servicing never redirected control: the program still completes.
    run_to_halt(&mut machine, 256);
    assert_eq!(machine.read_cell(0x0010), 0x03);
}

#[test]
fn keystroke_after_halt_stays_buffered() {
    let (mut machine, _) = machine_with(&[0x00]);

    run_to_halt(&mut machine, 8);
    machine.inject_key(b'q');

    // The clock is no longer pulsing, so nothing drains the buffer.
    assert_eq!(machine.keyboard().buffered(), 1);
    assert_eq!(machine.controller().pending_len(), 1);
}
