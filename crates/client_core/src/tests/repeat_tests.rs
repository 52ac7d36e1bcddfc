use std::sync::{Arc, Mutex};

use super::*;

#[derive(Clone, Default)]
struct RecordingSink {
    commands: Arc<Mutex<Vec<Command>>>,
}

impl RecordingSink {
    fn tokens(&self) -> Vec<String> {
        self.commands
            .lock()
            .expect("commands")
            .iter()
            .map(|command| match command {
                Command::Action(token) => token.to_string(),
                other => panic!("unexpected command {other:?}"),
            })
            .collect()
    }
}

impl CommandSink for RecordingSink {
    fn submit(&self, command: Command) {
        self.commands.lock().expect("commands").push(command);
    }
}

fn count(tokens: &[String], token: &str) -> usize {
    tokens.iter().filter(|t| t.as_str() == token).count()
}

#[tokio::test(start_paused = true)]
async fn held_press_repeats_at_interval_then_stops_once() {
    let sink = RecordingSink::default();
    let dispatcher = RepeatDispatcher::for_button(
        sink.clone(),
        DriveButton::Forward,
        DEFAULT_REPEAT_INTERVAL,
    );

    let session = dispatcher.press();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    session.release().await;

    let tokens = sink.tokens();
    let repeats = count(&tokens, "w");
    assert!((9..=11).contains(&repeats), "repeats={repeats} tokens={tokens:?}");
    assert_eq!(count(&tokens, "x"), 1);
    assert_eq!(tokens.last().map(String::as_str), Some("x"));
}

#[tokio::test(start_paused = true)]
async fn no_commands_after_release() {
    let sink = RecordingSink::default();
    let dispatcher = RepeatDispatcher::new(
        sink.clone(),
        ActionToken::new("<"),
        DEFAULT_REPEAT_INTERVAL,
    );

    let session = dispatcher.press();
    tokio::time::sleep(Duration::from_millis(350)).await;
    session.release().await;
    let after_release = sink.tokens();

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(sink.tokens(), after_release);
}

#[tokio::test(start_paused = true)]
async fn immediate_release_still_sends_stop() {
    let sink = RecordingSink::default();
    let dispatcher =
        RepeatDispatcher::for_button(sink.clone(), DriveButton::Left, DEFAULT_REPEAT_INTERVAL);

    dispatcher.press().release().await;

    let tokens = sink.tokens();
    assert!(count(&tokens, "a") <= 1, "tokens={tokens:?}");
    assert_eq!(count(&tokens, "x"), 1);
    assert_eq!(tokens.last().map(String::as_str), Some("x"));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_releases_the_button() {
    let sink = RecordingSink::default();
    let dispatcher =
        RepeatDispatcher::for_button(sink.clone(), DriveButton::Right, DEFAULT_REPEAT_INTERVAL);

    let session = dispatcher.press();
    tokio::time::sleep(Duration::from_millis(250)).await;
    drop(session);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let tokens = sink.tokens();
    assert_eq!(count(&tokens, "x"), 1);
    assert_eq!(tokens.last().map(String::as_str), Some("x"));
    assert!((2..=4).contains(&count(&tokens, "z")), "tokens={tokens:?}");
}

#[tokio::test(start_paused = true)]
async fn dispatchers_for_different_buttons_are_independent() {
    let sink = RecordingSink::default();
    let forward =
        RepeatDispatcher::for_button(sink.clone(), DriveButton::Forward, DEFAULT_REPEAT_INTERVAL);
    let rotate = RepeatDispatcher::for_button(
        sink.clone(),
        DriveButton::RotateRight,
        DEFAULT_REPEAT_INTERVAL,
    )
    .with_stop(ActionToken::new("s"));

    let held_forward = forward.press();
    let held_rotate = rotate.press();
    tokio::time::sleep(Duration::from_millis(300)).await;
    held_rotate.release().await;
    let rotations = count(&sink.tokens(), ">");
    tokio::time::sleep(Duration::from_millis(300)).await;
    held_forward.release().await;

    let tokens = sink.tokens();
    assert_eq!(count(&tokens, ">"), rotations);
    assert_eq!(count(&tokens, "s"), 1);
    assert_eq!(count(&tokens, "x"), 1);
    assert!(count(&tokens, "w") > rotations);
    assert_eq!(tokens.last().map(String::as_str), Some("x"));
}

#[tokio::test(start_paused = true)]
async fn zero_interval_keeps_the_default_cadence() {
    let sink = RecordingSink::default();
    let dispatcher =
        RepeatDispatcher::for_button(sink.clone(), DriveButton::Forward, Duration::ZERO);

    let session = dispatcher.press();
    tokio::time::sleep(Duration::from_millis(250)).await;
    session.release().await;

    let tokens = sink.tokens();
    assert!((2..=4).contains(&count(&tokens, "w")), "tokens={tokens:?}");
    assert_eq!(tokens.last().map(String::as_str), Some("x"));
}
