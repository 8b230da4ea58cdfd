//! Single-message error slot shared by every unit of work in one dispatch.
//!
//! Worklets cannot return errors out of a parallel region, so they raise
//! into this buffer instead. The first raise wins; later ones are dropped.
//! The dispatcher checks the buffer once the region has returned.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Maximum stored message length in bytes; longer messages are truncated.
pub const ERROR_MESSAGE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct ErrorMessageBuffer {
    raised: AtomicBool,
    message: Mutex<String>,
}

impl ErrorMessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` unless another message was recorded first.
    ///
    /// Returns `true` if this call's message is the one kept.
    pub fn raise(&self, message: &str) -> bool {
        if self.raised.swap(true, Ordering::AcqRel) {
            return false;
        }
        let mut slot = self.message.lock();
        slot.clear();
        slot.push_str(truncate(message, ERROR_MESSAGE_CAPACITY));
        true
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Clear the slot for the next dispatch.
    pub fn reset(&self) {
        self.message.lock().clear();
        self.raised.store(false, Ordering::Release);
    }

    /// Take the recorded message, leaving the buffer reset.
    pub fn take(&self) -> Option<String> {
        if !self.is_raised() {
            return None;
        }
        let message = std::mem::take(&mut *self.message.lock());
        self.raised.store(false, Ordering::Release);
        Some(message)
    }
}

fn truncate(message: &str, capacity: usize) -> &str {
    if message.len() <= capacity {
        return message;
    }
    let mut end = capacity;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_writer_wins() {
        let buf = ErrorMessageBuffer::new();
        assert!(buf.raise("first"));
        assert!(!buf.raise("second"));
        assert_eq!(buf.take().as_deref(), Some("first"));
        assert_eq!(buf.take(), None);
    }

    #[test]
    fn reset_clears() {
        let buf = ErrorMessageBuffer::new();
        buf.raise("x");
        buf.reset();
        assert!(!buf.is_raised());
        assert!(buf.raise("y"));
    }

    #[test]
    fn long_messages_truncate_on_char_boundary() {
        let msg = "é".repeat(ERROR_MESSAGE_CAPACITY);
        let buf = ErrorMessageBuffer::new();
        buf.raise(&msg);
        let got = buf.take().unwrap();
        assert!(got.len() <= ERROR_MESSAGE_CAPACITY);
        assert!(got.chars().all(|c| c == 'é'));
    }
}
