use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Steps the caret back, blanks the cell, steps back again.
pub const ERASE: &str = "\u{8} \u{8}";
/// Raw mode disables output post-processing, so line feeds need an explicit carriage return.
pub const NL: &str = "\r\n";

/// Raw-mode-safe terminal output. Clones share the same sink.
#[derive(Clone)]
pub struct Renderer {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Renderer {
    pub fn new<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn print_char(&self, ch: char) {
        let mut encoded = [0u8; 4];
        self.write(ch.encode_utf8(&mut encoded));
    }

    pub fn print_str(&self, text: &str) {
        if !text.is_empty() {
            self.write(text);
        }
    }

    pub fn erase_last_char(&self) {
        self.write(ERASE);
    }

    pub fn erase(&self, count: usize) {
        if count > 0 {
            self.write(&ERASE.repeat(count));
        }
    }

    pub fn newline(&self) {
        self.write(NL);
    }

    fn write(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Rewrites bare line feeds for raw-mode output.
pub fn to_raw_newlines(text: &str) -> String {
    text.replace('\n', NL)
}
