use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Process-wide lock for tests that mutate environment variables.
/// Use `.blocking_lock()` in sync tests and `.lock().await` in async tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// In-memory terminal sink shared between a `Renderer` and the test body.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Replays raw-mode output and returns what the last line shows plus the cursor column.
pub fn last_line(output: &str) -> (String, usize) {
    let mut line: Vec<char> = Vec::new();
    let mut column = 0usize;
    for ch in output.chars() {
        match ch {
            '\r' => column = 0,
            '\n' => {
                line.clear();
                column = 0;
            }
            '\u{8}' => column = column.saturating_sub(1),
            other => {
                if column < line.len() {
                    line[column] = other;
                } else {
                    line.resize(column, ' ');
                    line.push(other);
                }
                column += 1;
            }
        }
    }
    let shown: String = line.into_iter().collect();
    (shown.trim_end().to_string(), column)
}

pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
