
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::interrupt::{InterruptController, InterruptRequest, InterruptSource, PayloadQueue, Priority};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{error, trace};

/// The interrupt-generating input device: buffers captured keystrokes and
/// raises one request per byte, at regular priority.
pub struct Keyboard {
    irq: Option<usize>,
    buffer: PayloadQueue,
}

impl Keyboard {
    pub const NAME: &'static str = "keyboard";

    pub fn new() -> Keyboard {
        Keyboard {
            irq: None,
            buffer: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Buffers one captured byte and hands back the request to submit.
    pub fn press(&mut self, byte: u8) -> InterruptRequest {
        trace!("kbd: captured {byte:#04X}");
        self.buffer.lock().unwrap().push_back(byte);
        self.request()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptSource for Keyboard {
    fn irq(&self) -> Option<usize> {
        self.irq
    }

    fn assign_irq(&mut self, irq: usize) {
        self.irq = Some(irq);
    }

    fn priority(&self) -> Priority {
        Priority::Regular
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn payload(&self) -> PayloadQueue {
        self.buffer.clone()
    }
}

/// Raw-mode capture loop pumping terminal keystrokes into the controller.
/// Runs until ctrl-c or a read failure, then restores the terminal.
pub fn spawn_capture(
    keyboard: Arc<Mutex<Keyboard>>,
    controller: Arc<Mutex<InterruptController>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        terminal::enable_raw_mode().unwrap();
        loop {
            let event = match event::read() {
                Ok(event) => event,
                Err(err) => {
                    error!("kbd: capture failed: {err}");
                    break;
                }
            };
            let Event::Key(key) = event else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            let byte = match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char(ch) if ch.is_ascii() => ch as u8,
                KeyCode::Enter => b'\n',
                _ => {
                    trace!("kbd: ignoring key event {:?}", key.code);
                    continue;
                }
            };

            let request = keyboard.lock().unwrap().press(byte);
            controller.lock().unwrap().submit(request);
        }
        terminal::disable_raw_mode().unwrap();
    })
}
