//! The command buffer of a page.

use crate::command::Command;
use crate::task::DataSignal;
use crate::util::lock;
use log::warn;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    commands: Vec<Arc<Command>>,
    finished: bool,
}

/// The result of reading a position of a [`CommandBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Read {
    /// The command at the position.
    Command(Arc<Command>),
    /// There is no command at the position yet, but more may follow.
    Pending,
    /// There is no command at the position, and none will ever be appended.
    Finished,
}

/// An append-only sequence of commands with one writer and any number of
/// concurrent readers.
///
/// Appended commands are visible to readers as soon as [`CommandBuffer::append`]
/// returns, and commands are never reordered or modified. Once the buffer is
/// finished, every command appended before is visible, and readers waiting
/// for more data are woken up.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    inner: Mutex<Inner>,
    signal: DataSignal,
}

impl CommandBuffer {
    /// Create a new, empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty buffer that can be shared.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Append a command.
    ///
    /// Returns `false` and drops the command if the buffer is finished.
    pub fn append(&self, command: Command) -> bool {
        self.append_shared(Arc::new(command))
    }

    /// Append a command that may also be referenced elsewhere.
    pub fn append_shared(&self, command: Arc<Command>) -> bool {
        {
            let mut inner = lock(&self.inner);

            if inner.finished {
                warn!("attempted to append to a finished command buffer");

                return false;
            }

            inner.commands.push(command);
        }

        self.signal.notify();

        true
    }

    /// The number of commands.
    pub fn len(&self) -> usize {
        lock(&self.inner).commands.len()
    }

    /// Whether the buffer contains no commands.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The command at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<Command>> {
        lock(&self.inner).commands.get(index).cloned()
    }

    /// The commands in `from..to`, clamped to the available commands.
    pub fn slice(&self, from: usize, to: usize) -> Vec<Arc<Command>> {
        let inner = lock(&self.inner);
        let to = to.min(inner.commands.len());
        let from = from.min(to);

        inner.commands[from..to].to_vec()
    }

    /// Read the command at `index`, or find out whether one may still come.
    ///
    /// Both facts are determined atomically, so a reader that gets
    /// [`Read::Finished`] has seen every command.
    pub fn read(&self, index: usize) -> Read {
        let inner = lock(&self.inner);

        match inner.commands.get(index) {
            Some(c) => Read::Command(c.clone()),
            None if inner.finished => Read::Finished,
            None => Read::Pending,
        }
    }

    /// Mark the buffer as finished. Calling this more than once has no
    /// effect.
    pub fn finish(&self) {
        let changed = {
            let mut inner = lock(&self.inner);
            !std::mem::replace(&mut inner.finished, true)
        };

        if changed {
            self.signal.notify();
        }
    }

    /// Whether the buffer is finished.
    pub fn is_finished(&self) -> bool {
        lock(&self.inner).finished
    }

    /// Remove all commands and make the buffer appendable again.
    ///
    /// Readers must restart from the beginning after a clear.
    pub fn clear(&self) {
        {
            let mut inner = lock(&self.inner);
            inner.commands.clear();
            inner.finished = false;
        }

        self.signal.notify();
    }

    /// The signal notified on every append, finish and clear.
    pub fn signal(&self) -> DataSignal {
        self.signal.clone()
    }

    /// Block until the buffer has more than `len` commands, is finished, or
    /// the timeout elapses.
    pub fn wait_for_more(&self, len: usize, timeout: Duration) {
        let generation = self.signal.generation();

        if matches!(self.read(len), Read::Pending) {
            self.signal.wait_past(generation, timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn append_and_read() {
        let buffer = CommandBuffer::new();
        assert_eq!(buffer.read(0), Read::Pending);

        assert!(buffer.append(Command::Push));
        assert!(buffer.append(Command::Pop));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get(1).as_deref(), Some(&Command::Pop));
        assert_eq!(buffer.slice(1, 10).len(), 1);
        assert_eq!(buffer.slice(5, 10).len(), 0);
        assert_eq!(buffer.read(2), Read::Pending);
    }

    #[test]
    fn finish_is_idempotent() {
        let buffer = CommandBuffer::new();
        buffer.append(Command::Push);
        let generation = buffer.signal().generation();

        buffer.finish();
        buffer.finish();

        assert!(buffer.is_finished());
        assert_eq!(buffer.signal().generation(), generation + 1);
        assert_eq!(buffer.read(1), Read::Finished);
        assert!(!buffer.append(Command::Pop));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn clear_reopens() {
        let buffer = CommandBuffer::new();
        buffer.append(Command::Push);
        buffer.finish();
        buffer.clear();

        assert!(buffer.is_empty());
        assert!(!buffer.is_finished());
        assert!(buffer.append(Command::Push));
    }

    #[test]
    fn concurrent_reader_sees_commands_in_order() {
        let buffer = CommandBuffer::shared();
        let reader = {
            let buffer = buffer.clone();

            thread::spawn(move || {
                let mut seen = vec![];

                loop {
                    match buffer.read(seen.len()) {
                        Read::Command(c) => seen.push(c),
                        Read::Pending => buffer.wait_for_more(seen.len(), Duration::from_millis(50)),
                        Read::Finished => return seen,
                    }
                }
            })
        };

        for i in 0..500 {
            buffer.append(Command::SetStrokeWidth(i as f64));
        }

        buffer.finish();

        let seen = reader.join().unwrap();
        assert_eq!(seen.len(), 500);

        for (i, c) in seen.iter().enumerate() {
            assert_eq!(**c, Command::SetStrokeWidth(i as f64));
        }
    }
}
