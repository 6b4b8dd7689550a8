//! End-to-end pipeline tests: YAML config in, replies out, with real
//! child processes and a mock channel standing in for the transport.

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use chatcmd::channels::{Channel, InboundMessage, MessageStream, OutboundReply};
use chatcmd::config::Config;
use chatcmd::dispatcher::{DispatchOutcome, Dispatcher};
use chatcmd::error::ChannelError;
use chatcmd::rules::RuleSet;

/// Transport stand-in: plays back a fixed message list, records sends.
struct PlaybackChannel {
    messages: Mutex<Option<Vec<InboundMessage>>>,
    sent: Mutex<Vec<OutboundReply>>,
}

impl PlaybackChannel {
    fn new(messages: Vec<InboundMessage>) -> Self {
        Self {
            messages: Mutex::new(Some(messages)),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<OutboundReply> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for PlaybackChannel {
    fn name(&self) -> &str {
        "playback"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let messages = self
            .messages
            .lock()
            .unwrap()
            .take()
            .expect("start called twice");
        Ok(Box::pin(tokio_stream::iter(messages)))
    }

    async fn send(&self, reply: OutboundReply) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(reply);
        Ok(())
    }
}

fn write_config(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

async fn run_pipeline(
    yaml: &str,
    messages: Vec<InboundMessage>,
) -> (Vec<OutboundReply>, Vec<DispatchOutcome>) {
    let file = write_config(yaml);
    let config = Config::load(file.path()).unwrap();
    let timeout = config.command_timeout();
    let rules = RuleSet::compile(config.rules).unwrap();

    let expected = messages.len();
    let mut dispatcher = Dispatcher::new(rules, timeout);
    let mut outcomes_rx = dispatcher.outcome_reporter();
    let channel = Arc::new(PlaybackChannel::new(messages));

    dispatcher
        .run(channel.clone(), CancellationToken::new())
        .await
        .unwrap();

    let mut outcomes = Vec::with_capacity(expected);
    for _ in 0..expected {
        let outcome = tokio::time::timeout(Duration::from_secs(10), outcomes_rx.recv())
            .await
            .expect("timed out waiting for outcome")
            .expect("outcome channel closed early");
        outcomes.push(outcome);
    }
    (channel.sent(), outcomes)
}

#[tokio::test]
async fn config_file_to_reply_round_trip() {
    let yaml = r#"
rules:
  - name: greet
    pattern: "^hello"
    command: ["echo", "hi there"]
commandTimeout: 10s
"#;
    let messages = vec![InboundMessage::new("hello bot", "chat-9", "user-3", "msg-100")];
    let (sent, outcomes) = run_pipeline(yaml, messages).await;

    assert_eq!(outcomes, vec![DispatchOutcome::Replied { rule: "greet".into() }]);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "hi there -- hello bot\n");
    assert_eq!(sent[0].conversation_id, "chat-9");
    assert_eq!(sent[0].reply_to_message_id.as_deref(), Some("msg-100"));
}

#[tokio::test]
async fn first_rule_wins_and_unmatched_is_dropped() {
    let yaml = r#"
rules:
  - name: first
    pattern: "deploy"
    command: ["echo", "from-first"]
  - name: second
    pattern: "deploy prod"
    command: ["echo", "from-second"]
"#;
    let messages = vec![
        InboundMessage::new("deploy prod", "c", "u", "m1"),
        InboundMessage::new("unrelated chatter", "c", "u", "m2"),
    ];
    let (sent, outcomes) = run_pipeline(yaml, messages).await;

    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.starts_with("from-first"));
    assert!(outcomes.contains(&DispatchOutcome::Dropped));
}

#[tokio::test]
async fn stdin_rule_pipes_the_message_text() {
    let yaml = r#"
rules:
  - name: count
    pattern: "."
    useStdin: true
    command: ["cat"]
"#;
    let messages = vec![InboundMessage::new("exact text in, out", "c", "u", "m1")];
    let (sent, _) = run_pipeline(yaml, messages).await;

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "exact text in, out");
}

#[tokio::test]
async fn message_context_reaches_the_command_environment() {
    let yaml = r#"
rules:
  - name: whoami
    pattern: "^who"
    command: ["sh", "-c", "printf '%s/%s' \"$TELEGRAM_CHAT_ID\" \"$TELEGRAM_FROM_USER_ID\""]
"#;
    let messages = vec![InboundMessage::new("who is this", "chat-7", "user-42", "m1")];
    let (sent, _) = run_pipeline(yaml, messages).await;

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].body, "chat-7/user-42");
}

#[tokio::test]
async fn rule_environment_and_working_dir_apply() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
rules:
  - name: where
    pattern: "^where"
    workingDir: {}
    env:
      - "LABEL=staging"
    command: ["sh", "-c", "printf '%s:%s' \"$LABEL\" \"$(pwd)\""]
"#,
        dir.path().display()
    );
    let messages = vec![InboundMessage::new("where am i", "c", "u", "m1")];
    let (sent, _) = run_pipeline(&yaml, messages).await;

    assert_eq!(sent.len(), 1);
    let body = &sent[0].body;
    assert!(body.starts_with("staging:"));
    assert!(body.contains(dir.path().file_name().unwrap().to_str().unwrap()));
}

#[tokio::test]
async fn structured_output_and_failure_text_round_trip() {
    let yaml = r#"
rules:
  - name: status
    pattern: "^status"
    command: ["sh", "-c", "printf '{\"message\":\"all green\"}'"]
  - name: broken
    pattern: "^broken"
    command: ["sh", "-c", "echo nope >&2; exit 7"]
"#;
    let messages = vec![
        InboundMessage::new("status please", "c", "u", "m1"),
        InboundMessage::new("broken thing", "c", "u", "m2"),
    ];
    let (sent, _) = run_pipeline(yaml, messages).await;

    assert_eq!(sent.len(), 2);
    let bodies: Vec<&str> = sent.iter().map(|r| r.body.as_str()).collect();
    assert!(bodies.contains(&"all green"));
    assert!(bodies.iter().any(|b| b.contains("code=7") && b.contains("nope")));
}
