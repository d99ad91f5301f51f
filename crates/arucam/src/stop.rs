//! Stop signals polled by the loop once per cycle.

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, TryRecvError};

/// Source of the user's stop request.
pub trait StopSignal {
    /// Wait up to `wait` for input; `true` means stop now.
    fn poll(&mut self, wait: Duration) -> bool;
}

impl<T: StopSignal + ?Sized> StopSignal for Box<T> {
    fn poll(&mut self, wait: Duration) -> bool {
        (**self).poll(wait)
    }
}

/// Never asks to stop and does not wait.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn poll(&mut self, _wait: Duration) -> bool {
        false
    }
}

/// Line-based keyboard listener.
///
/// A reader thread forwards lines over a bounded channel; a line whose first
/// non-whitespace character is the quit key requests a stop. Other input is
/// ignored. Once the input is closed the listener only paces the loop.
pub struct KeyListener {
    quit_key: char,
    lines: Receiver<String>,
    closed: bool,
}

impl KeyListener {
    /// Listen on stdin.
    pub fn stdin(quit_key: char) -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()), quit_key)
    }

    pub fn from_reader<R>(reader: R, quit_key: char) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = bounded(16);
        let spawned = thread::Builder::new()
            .name("arucam-keys".to_string())
            .spawn(move || {
                for line in reader.lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            log::warn!("key listener unavailable: {e}");
        }
        Self {
            quit_key,
            lines: rx,
            closed: false,
        }
    }

    pub fn quit_key(&self) -> char {
        self.quit_key
    }

    fn is_quit(&self, line: &str) -> bool {
        line.trim_start()
            .chars()
            .next()
            .is_some_and(|c| c == self.quit_key)
    }
}

impl StopSignal for KeyListener {
    fn poll(&mut self, wait: Duration) -> bool {
        if self.closed {
            thread::sleep(wait);
            return false;
        }

        let first = match self.lines.recv_timeout(wait) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => return false,
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("key input closed");
                self.closed = true;
                return false;
            }
        };
        if self.is_quit(&first) {
            return true;
        }
        loop {
            match self.lines.try_recv() {
                Ok(line) if self.is_quit(&line) => return true,
                Ok(_) => {}
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return false;
                }
            }
        }
    }
}
