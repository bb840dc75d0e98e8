use super::render::Renderer;
use crate::api::logging::emit_task_panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const WAITING_PREFIX: &str = "Requesting ";
pub const TICK_INTERVAL: Duration = Duration::from_millis(200);
const MAX_DOTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EllipsisStep {
    Dot,
    Clear,
}

/// Phase counter for the growing ellipsis: three dots, then a clear.
#[derive(Debug, Default)]
pub struct Ellipsis {
    phase: u8,
}

impl Ellipsis {
    pub fn advance(&mut self) -> EllipsisStep {
        self.phase = (self.phase + 1) % (MAX_DOTS + 1);
        if self.phase == 0 {
            EllipsisStep::Clear
        } else {
            EllipsisStep::Dot
        }
    }
}

struct AnimationHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct WaitingAnimator {
    renderer: Renderer,
    interval: Duration,
    printed: Arc<AtomicUsize>,
    active: Option<AnimationHandle>,
}

impl WaitingAnimator {
    pub fn new(renderer: Renderer) -> Self {
        Self::with_interval(renderer, TICK_INTERVAL)
    }

    pub fn with_interval(renderer: Renderer, interval: Duration) -> Self {
        Self {
            renderer,
            interval,
            printed: Arc::new(AtomicUsize::new(0)),
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Characters the animation currently has on screen.
    pub fn printed(&self) -> usize {
        self.printed.load(Ordering::SeqCst)
    }

    pub async fn start(&mut self) {
        self.cancel_and_await_erasure().await;

        self.renderer.print_str(WAITING_PREFIX);
        self.printed.store(WAITING_PREFIX.len(), Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(tick(
            self.renderer.clone(),
            self.interval,
            Arc::clone(&self.printed),
            cancel.clone(),
        ));
        self.active = Some(AnimationHandle { cancel, task });
    }

    pub async fn cancel_and_await_erasure(&mut self) {
        let Some(handle) = self.active.take() else {
            return;
        };

        handle.cancel.cancel();
        if let Err(join_error) = handle.task.await {
            emit_task_panic("waiting animation", &join_error.to_string());
        }

        let printed = self.printed.swap(0, Ordering::SeqCst);
        self.renderer.erase(printed);
    }
}

async fn tick(
    renderer: Renderer,
    interval: Duration,
    printed: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    let mut ellipsis = Ellipsis::default();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        match ellipsis.advance() {
            EllipsisStep::Dot => {
                renderer.print_char('.');
                printed.fetch_add(1, Ordering::SeqCst);
            }
            EllipsisStep::Clear => {
                let dots = usize::from(MAX_DOTS);
                renderer.erase(dots);
                printed.fetch_sub(dots, Ordering::SeqCst);
            }
        }
    }
}
