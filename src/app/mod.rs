pub mod coordinator;

use crate::api::ChatStreamer;
use crate::state::{Conversation, SharedConversation};
use crate::terminal::KeySource;
use crate::ui::prompt::{Prompt, PromptInput};
use crate::ui::render::Renderer;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task;

pub use coordinator::{RequestCoordinator, TurnOutcome};

pub type SharedPrompt = Arc<Mutex<Prompt>>;

const CTRL_C: u32 = 3;

/// The interactive session: reads keys, interrupts live requests, and starts new turns.
pub struct ChatSession<K: KeySource> {
    keys: Option<K>,
    prompt: SharedPrompt,
    conversation: SharedConversation,
    coordinator: RequestCoordinator,
    renderer: Renderer,
}

impl<K: KeySource> ChatSession<K> {
    pub fn new(client: Arc<dyn ChatStreamer>, keys: K, renderer: Renderer) -> Self {
        let prompt = Prompt::new(renderer.clone());
        Self::with_prompt(client, keys, renderer, prompt)
    }

    pub fn with_animation_interval(
        client: Arc<dyn ChatStreamer>,
        keys: K,
        renderer: Renderer,
        interval: Duration,
    ) -> Self {
        let prompt = Prompt::with_animation_interval(renderer.clone(), interval);
        Self::with_prompt(client, keys, renderer, prompt)
    }

    fn with_prompt(
        client: Arc<dyn ChatStreamer>,
        keys: K,
        renderer: Renderer,
        prompt: Prompt,
    ) -> Self {
        let prompt = Arc::new(Mutex::new(prompt));
        let conversation = Conversation::new().into_shared();
        let coordinator = RequestCoordinator::new(
            client,
            Arc::clone(&conversation),
            Arc::clone(&prompt),
            renderer.clone(),
        );

        Self {
            keys: Some(keys),
            prompt,
            conversation,
            coordinator,
            renderer,
        }
    }

    pub fn conversation(&self) -> SharedConversation {
        Arc::clone(&self.conversation)
    }

    /// Runs until Ctrl+C or end of input. Any live request is cancelled and committed and
    /// the waiting animation is cleared before this returns, even when reading fails.
    pub async fn run(mut self) -> Result<()> {
        let result = self.input_loop().await;
        self.shutdown().await;
        result
    }

    async fn input_loop(&mut self) -> Result<()> {
        self.prompt.lock().await.accept_input(PromptInput::Redraw);

        loop {
            let code = match self.read_code().await? {
                None | Some(CTRL_C) => return Ok(()),
                Some(code) => code,
            };

            self.coordinator.cancel_current().await;

            let submitted = self
                .prompt
                .lock()
                .await
                .accept_input(PromptInput::Code(code));
            if let Some(text) = submitted {
                self.coordinator.submit(text).await;
            }
        }
    }

    /// The read blocks, so it runs on the blocking pool and the key source travels with it.
    async fn read_code(&mut self) -> Result<Option<u32>> {
        let Some(mut keys) = self.keys.take() else {
            return Ok(None);
        };

        let (keys, code) = task::spawn_blocking(move || {
            let code = keys.read_code();
            (keys, code)
        })
        .await
        .context("terminal read task failed")?;

        self.keys = Some(keys);
        code
    }

    async fn shutdown(&mut self) {
        self.coordinator.cancel_current().await;
        self.prompt.lock().await.shutdown().await;
        self.renderer.newline();
    }
}
