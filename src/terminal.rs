use anyhow::{bail, Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::{self, IsTerminal, Read};
use std::sync::Once;

static PANIC_HOOK_INSTALLED: Once = Once::new();

/// Blocking source of raw input codes. `Ok(None)` means end of input.
pub trait KeySource: Send + 'static {
    fn read_code(&mut self) -> Result<Option<u32>>;
}

pub fn install_panic_hook_once() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let _ = restore();
            original_hook(panic_info);
        }));
    });
}

pub fn restore() -> Result<()> {
    disable_raw_mode()?;
    Ok(())
}

/// Keeps the terminal in raw mode for as long as it lives.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn enable() -> Result<Self> {
        if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
            bail!("no interactive terminal attached; run vexchat from a terminal");
        }

        install_panic_hook_once();
        enable_raw_mode().context("failed to enable raw terminal mode")?;
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = restore();
    }
}

/// Reads stdin one byte at a time. Raw mode delivers Enter as 13 and Ctrl+C as 3.
pub struct StdinKeys {
    stdin: io::Stdin,
}

impl StdinKeys {
    pub fn new() -> Self {
        Self { stdin: io::stdin() }
    }
}

impl Default for StdinKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for StdinKeys {
    fn read_code(&mut self) -> Result<Option<u32>> {
        let mut byte = [0u8; 1];
        loop {
            match self.stdin.lock().read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(u32::from(byte[0]))),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context("failed to read from terminal"),
            }
        }
    }
}
