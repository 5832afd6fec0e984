use super::*;
use crate::core::catalog::test_catalog;
use crate::core::preferences::MemoryPreferenceStore;
use crate::core::session::APOLOGY_MESSAGE;
use crate::utils::test_utils::{FailingPreferenceStore, MockProvider, MockReply};
use tempfile::TempDir;

fn host<'a>(
    catalog: &'a ModelCatalog,
    provider: Arc<MockProvider>,
    preferences: &'a dyn PreferenceStore,
    input: &'static str,
    logging: LoggingState,
) -> ChatHost<'a, &'static [u8], Vec<u8>> {
    ChatHost {
        catalog,
        provider,
        preferences,
        lines: input.as_bytes().lines(),
        out: Vec::new(),
        logging,
    }
}

fn no_log() -> LoggingState {
    LoggingState::new(None).expect("logging without a file")
}

fn output(host: &ChatHost<'_, &'static [u8], Vec<u8>>) -> String {
    String::from_utf8(host.out.clone()).expect("output should be UTF-8")
}

#[test]
fn parse_input_recognizes_commands() {
    assert_eq!(parse_input("/help"), ChatInput::Command(ChatCommand::Help));
    assert_eq!(parse_input("  /models "), ChatInput::Command(ChatCommand::Models));
    assert_eq!(
        parse_input("/model  2 "),
        ChatInput::Command(ChatCommand::Model("2"))
    );
    assert_eq!(parse_input("/back"), ChatInput::Command(ChatCommand::Back));
    assert_eq!(parse_input("/log"), ChatInput::Command(ChatCommand::Log(None)));
    assert_eq!(
        parse_input("/log chat.txt"),
        ChatInput::Command(ChatCommand::Log(Some("chat.txt")))
    );
    assert_eq!(parse_input("/exit"), ChatInput::Command(ChatCommand::Quit));
}

#[test]
fn parse_input_treats_other_lines_as_text() {
    assert_eq!(parse_input("Hello"), ChatInput::Text("Hello"));
    assert_eq!(parse_input("/usr/bin is a path"), ChatInput::Text("/usr/bin is a path"));
    assert_eq!(parse_input("   "), ChatInput::Text("   "));
}

#[tokio::test]
async fn picker_default_then_reply_is_printed() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::replying([MockReply::Reply("Hi there")]));
    let mut host = host(&catalog, provider.clone(), &store, "\nHello\n", no_log());

    host.run(None).await.expect("chat should finish");

    let text = output(&host);
    assert!(text.contains("Choose your AI companion:"));
    assert!(text.contains("* 1. Model A (Test)"));
    assert!(text.contains("Chatting with Model A (model-A)"));
    assert!(text.contains("Hi there"));
    assert_eq!(provider.call_count(), 1);
    assert_eq!(
        store.writes(),
        vec![(SELECTED_MODEL_KEY.to_string(), "model-A".to_string())]
    );
}

#[tokio::test]
async fn provider_failure_prints_apology() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::replying([MockReply::Fail(
        crate::core::provider::ProviderError::MalformedResponse("no choices".to_string()),
    )]));
    let mut host = host(&catalog, provider, &store, "1\nHello\n", no_log());

    host.run(None).await.expect("chat should finish");

    assert!(output(&host).contains(APOLOGY_MESSAGE));
}

#[tokio::test]
async fn input_while_pending_is_not_sent() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::new());
    let mut host = host(&catalog, provider.clone(), &store, "\nfirst\nsecond\n", no_log());

    host.run(None).await.expect("chat should finish");

    assert!(output(&host).contains("Waiting for the current reply"));
    assert_eq!(provider.call_count(), 1);
    assert_eq!(provider.requests()[0].messages.len(), 1);
}

#[tokio::test]
async fn back_returns_to_the_picker() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::new());
    let mut host = host(&catalog, provider, &store, "2\n/back\n1\n/quit\n", no_log());

    host.run(None).await.expect("chat should finish");

    let text = output(&host);
    assert_eq!(text.matches("Choose your AI companion:").count(), 2);
    assert!(text.contains("Chatting with Model B"));
    assert!(text.contains("Chatting with Model A"));
    let written: Vec<String> = store.writes().into_iter().map(|(_, id)| id).collect();
    assert_eq!(written, vec!["model-B", "model-A"]);
}

#[tokio::test]
async fn model_command_switches_and_reports_unknown_ids() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::new());
    let mut host = host(
        &catalog,
        provider,
        &store,
        "/model 2\n/model nope\n/quit\n",
        no_log(),
    );

    host.run(Some("model-A".to_string()))
        .await
        .expect("chat should finish");

    let text = output(&host);
    assert!(!text.contains("Choose your AI companion:"));
    assert!(text.contains("Now using model-B"));
    assert!(text.contains("Unknown model: nope"));
    let written: Vec<String> = store.writes().into_iter().map(|(_, id)| id).collect();
    assert_eq!(written, vec!["model-A", "model-B"]);
}

#[tokio::test]
async fn unknown_preselected_model_falls_back_to_picker() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::new());
    let mut host = host(&catalog, provider, &store, "9\nmodel-B\n/quit\n", no_log());

    host.run(Some("gpt-4o".to_string()))
        .await
        .expect("chat should finish");

    let text = output(&host);
    assert!(text.contains("Unknown model: gpt-4o"));
    assert!(text.contains("Unknown choice: 9"));
    assert!(text.contains("Chatting with Model B"));
}

#[tokio::test]
async fn transcript_records_both_sides() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("transcript.log");
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::replying([MockReply::Reply("Hi there")]));
    let logging = LoggingState::new(Some(path.clone())).expect("log file should open");
    let mut host = host(&catalog, provider, &store, "\nHello\n", logging);

    host.run(None).await.expect("chat should finish");

    let transcript = std::fs::read_to_string(&path).expect("read transcript");
    assert!(transcript.contains("You:\nHello"));
    assert!(transcript.contains("Assistant:\nHi there"));
}

#[tokio::test]
async fn end_of_input_at_picker_exits_cleanly() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::new());
    let mut host = host(&catalog, provider.clone(), &store, "", no_log());

    host.run(None).await.expect("chat should finish");

    assert!(store.writes().is_empty());
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn bare_model_command_shows_current_model() {
    let catalog = test_catalog();
    let store = MemoryPreferenceStore::new();
    let provider = Arc::new(MockProvider::new());
    let mut host = host(&catalog, provider, &store, "/model\n/quit\n", no_log());

    host.run(Some("model-B".to_string()))
        .await
        .expect("chat should finish");

    let text = output(&host);
    assert!(text.contains("Current model: model-B. Usage: /model <number|id>"));
    assert!(!text.contains("Unknown model"));
    assert_eq!(store.writes().len(), 1);
}

#[tokio::test]
async fn unsaved_model_switch_warns_and_still_switches() {
    let catalog = test_catalog();
    let store = FailingPreferenceStore::failing_after(1);
    let provider = Arc::new(MockProvider::replying([MockReply::Reply("from B")]));
    let mut host = host(&catalog, provider.clone(), &store, "/model 2\nHello\n", no_log());

    host.run(Some("model-A".to_string()))
        .await
        .expect("chat should finish");

    let text = output(&host);
    assert!(text.contains("Now using model-B, but the choice could not be saved"));
    assert!(text.contains("from B"));
    assert_eq!(store.attempts(), 2);
    assert_eq!(provider.requests()[0].model, "model-B");
}
