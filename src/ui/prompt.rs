use super::animation::WaitingAnimator;
use super::render::{to_raw_newlines, Renderer};
use std::time::Duration;

pub const PROMPT_LABEL: &str = "Prompt :> ";
pub const ASSISTANT_LABEL: &str = "ChatGPT :< ";

const BACKSPACE: u32 = 8;
const DELETE: u32 = 127;
const ENTER: u32 = 13;
const PRINTABLE: std::ops::RangeInclusive<u32> = 32..=127;

/// One unit fed to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptInput {
    /// Show the prompt label if it is not already showing, consume nothing.
    Redraw,
    Code(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Idle,
    Prompting,
    Displaying,
}

pub struct Prompt {
    renderer: Renderer,
    buffer: String,
    mode: PromptMode,
    animator: WaitingAnimator,
}

impl Prompt {
    pub fn new(renderer: Renderer) -> Self {
        let animator = WaitingAnimator::new(renderer.clone());
        Self::with_animator(renderer, animator)
    }

    pub fn with_animation_interval(renderer: Renderer, interval: Duration) -> Self {
        let animator = WaitingAnimator::with_interval(renderer.clone(), interval);
        Self::with_animator(renderer, animator)
    }

    fn with_animator(renderer: Renderer, animator: WaitingAnimator) -> Self {
        Self {
            renderer,
            buffer: String::new(),
            mode: PromptMode::Idle,
            animator,
        }
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }

    pub fn is_waiting(&self) -> bool {
        self.animator.is_active()
    }

    /// Returns the submitted line when `input` completes a non-blank one.
    pub fn accept_input(&mut self, input: PromptInput) -> Option<String> {
        if self.mode != PromptMode::Prompting {
            self.renderer.newline();
            self.renderer.print_str(PROMPT_LABEL);
            self.mode = PromptMode::Prompting;
        }

        let code = match input {
            PromptInput::Redraw => return None,
            PromptInput::Code(code) => code,
        };

        match code {
            BACKSPACE | DELETE => {
                if self.buffer.pop().is_some() {
                    self.renderer.erase_last_char();
                }
                None
            }
            ENTER => {
                let line = std::mem::take(&mut self.buffer);
                if line.trim().is_empty() {
                    return None;
                }
                self.mode = PromptMode::Displaying;
                self.renderer.newline();
                self.renderer.print_str(ASSISTANT_LABEL);
                Some(line)
            }
            code if PRINTABLE.contains(&code) => {
                let ch = char::from_u32(code)?;
                self.buffer.push(ch);
                self.renderer.print_char(ch);
                None
            }
            _ => None,
        }
    }

    pub async fn start_waiting(&mut self) {
        self.animator.start().await;
    }

    pub async fn stop_waiting(&mut self) {
        self.animator.cancel_and_await_erasure().await;
    }

    pub async fn display_chunk(&mut self, text: &str) {
        self.stop_waiting().await;
        self.renderer.print_str(&to_raw_newlines(text));
    }

    pub async fn shutdown(&mut self) {
        self.stop_waiting().await;
    }
}
