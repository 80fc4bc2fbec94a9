//! Seams between the navigation core and its transports.
//!
//! Inbound bytes arrive through [`ByteSource`] (non-blocking, one byte at a
//! time); outbound sentences leave through [`SentenceSink`] with no
//! acknowledgement or retry.

use std::collections::VecDeque;
use std::io;

/// Non-blocking byte supplier.
pub trait ByteSource {
    /// Next buffered byte, or `None` when nothing is waiting.
    fn read_byte(&mut self) -> Option<u8>;
}

impl ByteSource for VecDeque<u8> {
    fn read_byte(&mut self) -> Option<u8> {
        self.pop_front()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }
}

/// An absent port never yields bytes.
impl<S: ByteSource> ByteSource for Option<S> {
    fn read_byte(&mut self) -> Option<u8> {
        self.as_mut().and_then(|source| source.read_byte())
    }
}

/// Receiver of complete outbound sentences (including `\r\n`).
pub trait SentenceSink {
    fn send(&mut self, sentence: &str) -> io::Result<()>;
}

impl SentenceSink for Vec<String> {
    fn send(&mut self, sentence: &str) -> io::Result<()> {
        self.push(sentence.to_string());
        Ok(())
    }
}

impl<S: SentenceSink + ?Sized> SentenceSink for &mut S {
    fn send(&mut self, sentence: &str) -> io::Result<()> {
        (**self).send(sentence)
    }
}
