use std::cell::{RefCell, RefMut};
use std::io::{self, BufRead, BufReader, Write};
use std::ops::Deref;
use std::rc::Rc;

/// Shared handle to a readable stream.
///
/// The concrete type stays abstract so a file, the terminal, an in-memory
/// buffer, or a pipe endpoint can all be bound the same way.
pub type InputStream = Rc<RefCell<dyn BufRead>>;

/// Shared handle to a writable stream. Output and error may hold the same one.
pub type OutputStream = Rc<RefCell<dyn Write>>;

/// Which of the three streams a binding opened itself and must release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub input: bool,
    pub output: bool,
    pub error: bool,
}

impl Ownership {
    pub const NONE: Ownership = Ownership {
        input: false,
        output: false,
        error: false,
    };

    pub fn any(self) -> bool {
        self.input || self.output || self.error
    }
}

/// The input, output and error streams a command runs with.
///
/// A binding either borrows its streams from an enclosing binding or opens
/// them itself; [`Ownership`] records which. Dropping a binding flushes the
/// output streams it owns and releases its references, so an owned file is
/// closed once no binding refers to it any more. Inherited streams are never
/// closed by a derived binding.
pub struct IoBinding {
    input: InputStream,
    output: OutputStream,
    error: OutputStream,
    owned: Ownership,
}

impl IoBinding {
    pub fn new(
        input: InputStream,
        output: OutputStream,
        error: OutputStream,
        owned: Ownership,
    ) -> Self {
        Self {
            input,
            output,
            error,
            owned,
        }
    }

    /// A binding over the real stdin, stdout and stderr of this process.
    ///
    /// It owns nothing: the process streams outlive every command.
    pub fn stdio() -> Self {
        Self::new(
            Rc::new(RefCell::new(BufReader::new(io::stdin()))),
            Rc::new(RefCell::new(io::stdout())),
            Rc::new(RefCell::new(io::stderr())),
            Ownership::NONE,
        )
    }

    pub fn input(&self) -> RefMut<'_, dyn BufRead> {
        self.input.borrow_mut()
    }

    /// Borrow the output stream for writing.
    ///
    /// Output and error may be the same stream, so do not hold this borrow
    /// while also borrowing [`IoBinding::error`].
    pub fn output(&self) -> RefMut<'_, dyn Write> {
        self.output.borrow_mut()
    }

    pub fn error(&self) -> RefMut<'_, dyn Write> {
        self.error.borrow_mut()
    }

    pub fn input_stream(&self) -> &InputStream {
        &self.input
    }

    pub fn output_stream(&self) -> &OutputStream {
        &self.output
    }

    pub fn error_stream(&self) -> &OutputStream {
        &self.error
    }

    pub fn owned(&self) -> Ownership {
        self.owned
    }

    /// Whether output and error currently write to the same stream.
    pub fn is_merged(&self) -> bool {
        Rc::ptr_eq(&self.output, &self.error)
    }

    /// Flush both output streams, owned or not.
    pub fn flush(&self) -> io::Result<()> {
        self.output().flush()?;
        if !self.is_merged() {
            self.error().flush()?;
        }
        Ok(())
    }

    /// Release the streams this binding opened, reporting flush failures.
    pub fn release(self) -> io::Result<()> {
        let result = self.flush_owned();
        drop(self);
        result
    }

    fn flush_owned(&self) -> io::Result<()> {
        if !self.owned.any() {
            return Ok(());
        }
        if self.owned.output {
            self.output().flush()?;
        }
        if self.owned.error && !(self.owned.output && self.is_merged()) {
            self.error().flush()?;
        }
        Ok(())
    }
}

impl Drop for IoBinding {
    fn drop(&mut self) {
        if let Err(e) = self.flush_owned() {
            log::warn!("failed to flush redirected stream: {e}");
        }
    }
}

/// The binding a command runs with after redirects were applied.
///
/// With no redirects the caller's binding is used as is; otherwise a freshly
/// derived binding owns whatever the redirects opened.
pub enum Resolved<'a> {
    Inherited(&'a IoBinding),
    Derived(IoBinding),
}

impl Resolved<'_> {
    pub fn is_inherited(&self) -> bool {
        matches!(self, Resolved::Inherited(_))
    }

    /// Release owned streams. A no-op for an inherited binding.
    pub fn release(self) -> io::Result<()> {
        match self {
            Resolved::Inherited(_) => Ok(()),
            Resolved::Derived(binding) => binding.release(),
        }
    }
}

impl Deref for Resolved<'_> {
    type Target = IoBinding;

    fn deref(&self) -> &IoBinding {
        match self {
            Resolved::Inherited(binding) => binding,
            Resolved::Derived(binding) => binding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::{MemReader, MemWriter, memory_binding};

    #[test]
    fn test_streams_are_independent() {
        let (binding, out, err) = memory_binding("line one\n");
        write!(binding.output(), "to out").unwrap();
        write!(binding.error(), "to err").unwrap();

        let mut s = String::new();
        binding.input().read_to_string(&mut s).unwrap();

        assert_eq!(s, "line one\n");
        assert_eq!(out.text(), "to out");
        assert_eq!(err.text(), "to err");
        assert!(!binding.is_merged());
    }

    #[test]
    fn test_merged_streams_interleave() {
        let (out, buf) = MemWriter::with_handle();
        let shared: OutputStream = Rc::new(RefCell::new(out));
        let binding = IoBinding::new(
            Rc::new(RefCell::new(MemReader::new(Vec::new()))),
            shared.clone(),
            shared,
            Ownership {
                input: false,
                output: true,
                error: true,
            },
        );
        write!(binding.output(), "a").unwrap();
        write!(binding.error(), "b").unwrap();
        write!(binding.output(), "c").unwrap();

        assert!(binding.is_merged());
        binding.release().unwrap();
        assert_eq!(buf.borrow().as_slice(), b"abc");
    }

    #[test]
    fn test_ownership_any() {
        assert!(!Ownership::NONE.any());
        assert!(
            Ownership {
                error: true,
                ..Ownership::default()
            }
            .any()
        );
    }

    #[test]
    fn test_inherited_release_is_noop() {
        let (binding, out, _) = memory_binding("");
        {
            let resolved = Resolved::Inherited(&binding);
            assert!(resolved.is_inherited());
            write!(resolved.output(), "still usable").unwrap();
            resolved.release().unwrap();
        }
        write!(binding.output(), "!").unwrap();
        assert_eq!(out.text(), "still usable!");
    }
}
