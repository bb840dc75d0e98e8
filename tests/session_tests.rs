use std::io::{self, Write};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use vexchat::api::mock_client::{MockChatStreamer, MockReply};
use vexchat::app::ChatSession;
use vexchat::state::SharedConversation;
use vexchat::terminal::KeySource;
use vexchat::types::{ChatMessage, StreamDelta};
use vexchat::ui::prompt::{ASSISTANT_LABEL, PROMPT_LABEL};
use vexchat::ui::render::Renderer;

struct ChannelKeys {
    rx: mpsc::Receiver<u8>,
}

impl KeySource for ChannelKeys {
    fn read_code(&mut self) -> anyhow::Result<Option<u32>> {
        Ok(self.rx.recv().ok().map(u32::from))
    }
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Running {
    keys: mpsc::Sender<u8>,
    conversation: SharedConversation,
    capture: Capture,
    session: tokio::task::JoinHandle<anyhow::Result<()>>,
}

fn start(mock: &MockChatStreamer) -> Running {
    let (keys, rx) = mpsc::channel();
    let capture = Capture::default();
    let session = ChatSession::with_animation_interval(
        Arc::new(mock.clone()),
        ChannelKeys { rx },
        Renderer::new(capture.clone()),
        Duration::from_millis(5),
    );
    let conversation = session.conversation();
    let session = tokio::spawn(session.run());
    Running {
        keys,
        conversation,
        capture,
        session,
    }
}

impl Running {
    fn type_keys(&self, text: &str) {
        for byte in text.bytes() {
            self.keys.send(byte).unwrap();
        }
    }

    async fn wait_for<F>(&self, mut condition: F)
    where
        F: FnMut(&[ChatMessage], Option<&str>) -> bool,
    {
        for _ in 0..500 {
            {
                let conversation = self.conversation.lock().await;
                if condition(conversation.messages(), conversation.pending_reply()) {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never reached the expected state");
    }

    async fn history(&self) -> Vec<ChatMessage> {
        self.conversation.lock().await.messages_for_api()
    }
}

fn content(text: &str) -> StreamDelta {
    StreamDelta::Content(text.to_string())
}

#[tokio::test]
async fn test_streamed_reply_is_displayed_and_committed() {
    let mock = MockChatStreamer::new(vec![MockReply::Complete(vec![
        content("Hel"),
        content("lo"),
        StreamDelta::Finish,
    ])]);
    let running = start(&mock);

    running.type_keys("hi\r");
    running.wait_for(|messages, _| messages.len() == 2).await;

    drop(running.keys);
    running.session.await.unwrap().expect("session should end cleanly");

    assert_eq!(
        running.conversation.lock().await.messages_for_api(),
        vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello")]
    );
    let output = running.capture.text();
    assert!(output.starts_with(&format!("\r\n{PROMPT_LABEL}hi\r\n{ASSISTANT_LABEL}")));
    let hel = output.find("Hel").unwrap();
    let lo = output[hel..].find("lo").unwrap();
    assert!(output[hel + lo..].contains(&format!("\r\n{PROMPT_LABEL}")));
    assert!(output.ends_with("\r\n"));
}

#[tokio::test]
async fn test_second_submit_before_first_delta_cancels_first_turn() {
    let mock = MockChatStreamer::new(vec![
        MockReply::Stall(vec![]),
        MockReply::Complete(vec![content("ok"), StreamDelta::Finish]),
    ]);
    let running = start(&mock);

    running.type_keys("a\r");
    running.wait_for(|messages, _| messages.len() == 1).await;
    running.type_keys("b\r");
    running.wait_for(|messages, _| messages.len() == 4).await;

    assert_eq!(
        running.history().await,
        vec![
            ChatMessage::user("a"),
            ChatMessage::assistant(""),
            ChatMessage::user("b"),
            ChatMessage::assistant("ok"),
        ]
    );
    let requests = mock.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 3);

    drop(running.keys);
    running.session.await.unwrap().expect("session should end cleanly");
}

#[tokio::test]
async fn test_ctrl_c_while_streaming_commits_partial_reply() {
    let mock = MockChatStreamer::new(vec![MockReply::Stall(vec![content("Hel")])]);
    let running = start(&mock);

    running.type_keys("hi\r");
    running.wait_for(|_, pending| pending == Some("Hel")).await;
    running.type_keys("\u{3}");

    tokio::time::timeout(Duration::from_secs(5), running.session)
        .await
        .expect("shutdown must not hang")
        .unwrap()
        .expect("session should end cleanly");

    assert_eq!(
        running.conversation.lock().await.messages_for_api(),
        vec![ChatMessage::user("hi"), ChatMessage::assistant("Hel")]
    );
    assert!(running.capture.text().ends_with("Hel\r\n\r\n"));
}

#[tokio::test]
async fn test_failed_request_keeps_session_alive() {
    let mock = MockChatStreamer::new(vec![
        MockReply::Fail(vec![content("par")], "connection reset".to_string()),
        MockReply::Complete(vec![content("fine"), StreamDelta::Finish]),
    ]);
    let running = start(&mock);

    running.type_keys("one\r");
    running.wait_for(|messages, _| messages.len() == 2).await;
    running.type_keys("two\r");
    running.wait_for(|messages, _| messages.len() == 4).await;

    assert_eq!(
        running.history().await,
        vec![
            ChatMessage::user("one"),
            ChatMessage::assistant("par"),
            ChatMessage::user("two"),
            ChatMessage::assistant("fine"),
        ]
    );
    let output = running.capture.text();
    assert!(output.contains(&format!("par\r\n{PROMPT_LABEL}two")));

    drop(running.keys);
    running.session.await.unwrap().expect("session should end cleanly");
}

#[tokio::test]
async fn test_blank_lines_and_backspaces_never_reach_the_client() {
    let mock = MockChatStreamer::new(vec![MockReply::Complete(vec![StreamDelta::Finish])]);
    let running = start(&mock);

    running.type_keys("  \r\u{7f}xy\u{8}\u{8}\u{8}z\r");
    running.wait_for(|messages, _| messages.len() == 2).await;

    drop(running.keys);
    running.session.await.unwrap().expect("session should end cleanly");

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages, vec![ChatMessage::user("z")]);
    assert_eq!(
        running.conversation.lock().await.messages_for_api(),
        vec![ChatMessage::user("z"), ChatMessage::assistant("")]
    );
}
