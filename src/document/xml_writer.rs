//! Buffered XML writer with minimal allocations

use crate::error::Result;
use std::io::{self, Read, Write};

const DRAIN_THRESHOLD: usize = 4096;

/// XML writer that batches small writes in a local buffer.
///
/// Draining the buffer never flushes the underlying writer, so wrapping a compressor does
/// not emit sync blocks on every few kilobytes.
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    numbers: itoa::Buffer,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(8192),
            numbers: itoa::Buffer::new(),
        }
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > DRAIN_THRESHOLD {
            self.drain()?;
        }
        Ok(())
    }

    /// Write string data
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Write an integer as decimal text
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, value: I) -> Result<()> {
        self.buffer
            .extend_from_slice(self.numbers.format(value).as_bytes());
        if self.buffer.len() > DRAIN_THRESHOLD {
            self.drain()?;
        }
        Ok(())
    }

    /// Write XML element start tag (left open for attributes)
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_str(name)
    }

    /// Write XML element end tag
    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"</")?;
        self.write_str(name)?;
        self.write_raw(b">")
    }

    /// Close an open start tag as a self-closing element
    #[inline]
    pub fn close_empty_element(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    /// Write attribute
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    /// Write attribute with integer value
    #[inline]
    pub fn attribute_int<I: itoa::Integer>(&mut self, name: &str, value: I) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_int(value)?;
        self.write_raw(b"\"")
    }

    /// Close start tag
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Write text content with XML escaping
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        for byte in text.bytes() {
            match byte {
                b'&' => self.buffer.extend_from_slice(b"&amp;"),
                b'<' => self.buffer.extend_from_slice(b"&lt;"),
                b'>' => self.buffer.extend_from_slice(b"&gt;"),
                b'"' => self.buffer.extend_from_slice(b"&quot;"),
                b'\'' => self.buffer.extend_from_slice(b"&apos;"),
                _ => self.buffer.push(byte),
            }
        }
        if self.buffer.len() > DRAIN_THRESHOLD {
            self.drain()?;
        }
        Ok(())
    }

    /// Move buffered bytes to the underlying writer without flushing it
    pub fn drain(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Copy pre-rendered XML from `reader` straight to the underlying writer
    pub fn copy_from<R: Read>(&mut self, reader: &mut R) -> Result<u64> {
        self.drain()?;
        Ok(io::copy(reader, &mut self.writer)?)
    }

    /// Drain and flush the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.drain()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Drain the buffer and hand back the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.drain()?;
        Ok(self.writer)
    }
}
