use anyhow::Result;
use std::sync::Arc;
use vexchat::api::ApiClient;
use vexchat::app::ChatSession;
use vexchat::config::Config;
use vexchat::terminal::{RawModeGuard, StdinKeys};
use vexchat::ui::render::Renderer;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let client = Arc::new(ApiClient::new(&config)?);
    let _raw_mode = RawModeGuard::enable()?;

    let session = ChatSession::new(client, StdinKeys::new(), Renderer::stdout());
    session.run().await
}
