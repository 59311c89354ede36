//! Host capabilities used by primitives: console output, file reads and the clock.
//!
//! The interpreter never touches stdout, the file system or the system clock
//! directly. [`StdHost`] wires the capabilities to the process; [`BufferHost`]
//! keeps everything in memory for tests and embedding.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Host {
    /// Write text to the console without a trailing newline
    fn write_str(&mut self, text: &str) -> io::Result<()>;

    /// Full contents of the named file
    fn read_file(&mut self, path: &str) -> io::Result<String>;

    /// Wall-clock time in milliseconds since the Unix epoch
    fn now_millis(&self) -> f64;
}

/// Host backed by the process: stdout, `std::fs` and `SystemTime`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdHost;

impl Host for StdHost {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()
    }

    fn read_file(&mut self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn now_millis(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}

/// In-memory host.
///
/// Clones share the same output buffer, so a test can keep one handle and
/// give the other to an [`Interpreter`](crate::Interpreter):
///
/// ```
/// use pairlisp::Interpreter;
/// use pairlisp::host::BufferHost;
///
/// let host = BufferHost::new();
/// let mut interp = Interpreter::with_host(host.clone());
/// interp.eval_str("(display \"hi\")").unwrap();
/// assert_eq!(host.contents(), "hi");
/// ```
#[derive(Debug, Default, Clone)]
pub struct BufferHost {
    output: Rc<RefCell<String>>,
    files: HashMap<String, String>,
    clock: f64,
}

impl BufferHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `contents` for reads of `path`
    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(path.to_owned(), contents.to_owned());
        self
    }

    /// Fix the value reported by the clock
    pub fn with_clock(mut self, millis: f64) -> Self {
        self.clock = millis;
        self
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.output.borrow().clone()
    }
}

impl Host for BufferHost {
    fn write_str(&mut self, text: &str) -> io::Result<()> {
        self.output.borrow_mut().push_str(text);
        Ok(())
    }

    fn read_file(&mut self, path: &str) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
        })
    }

    fn now_millis(&self) -> f64 {
        self.clock
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;

    #[test]
    fn test_buffer_host_shares_output_between_clones() {
        let host = BufferHost::new();
        let mut writer = host.clone();
        writer.write_str("a").unwrap();
        writer.write_str("b\n").unwrap();
        assert_eq!(host.contents(), "ab\n");
    }

    #[test]
    fn test_buffer_host_files_and_clock() {
        let mut host = BufferHost::new()
            .with_file("lib.scm", "(define x 1)")
            .with_clock(1234.5);
        assert_eq!(host.read_file("lib.scm").unwrap(), "(define x 1)");
        assert_eq!(
            host.read_file("missing.scm").unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert_eq!(host.now_millis(), 1234.5);
    }

    #[test]
    fn test_std_host_clock_is_after_epoch() {
        assert!(StdHost.now_millis() > 0.0);
    }
}
