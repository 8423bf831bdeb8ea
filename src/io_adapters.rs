use crate::io_binding::{IoBinding, Ownership};
use std::cell::RefCell;
use std::io::{BufRead, Cursor, Read, Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed reader, usable as the input stream of a binding.
pub struct MemReader {
    cursor: Cursor<Vec<u8>>,
}

impl MemReader {
    /// Create a MemReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for MemReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl BufRead for MemReader {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

/// Memory-backed writer for capturing what a command writes.
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self {
            buf: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Convenience: create writer and return (writer, rc_handle).
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let mw = MemWriter::new();
        let rc = mw.buf.clone();
        (mw, rc)
    }
}

impl Default for MemWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

/// Read-only view of the bytes collected by a [`MemWriter`].
#[derive(Clone)]
pub struct Captured(Rc<RefCell<Vec<u8>>>);

impl Captured {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.borrow().clone()
    }

    /// Collected bytes as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

/// A binding that reads `input` and captures output and error in memory.
///
/// Nothing in it is owned, so it can serve as the base binding of a shell
/// whose streams are not the process's own.
pub fn memory_binding(input: impl Into<Vec<u8>>) -> (IoBinding, Captured, Captured) {
    let (out, out_buf) = MemWriter::with_handle();
    let (err, err_buf) = MemWriter::with_handle();
    let binding = IoBinding::new(
        Rc::new(RefCell::new(MemReader::new(input.into()))),
        Rc::new(RefCell::new(out)),
        Rc::new(RefCell::new(err)),
        Ownership::NONE,
    );
    (binding, Captured(out_buf), Captured(err_buf))
}
