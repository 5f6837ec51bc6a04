//! Orchestrator integration tests
//!
//! Drives full exchanges against a scripted backend and a recording speech
//! engine, delivering speech events by hand.

use std::sync::Arc;

use jarvis_console::conversation::DEFAULT_GREETING;
use jarvis_console::voice::{SessionId, SpeechCoordinator, SpeechEvent, UtteranceId};
use jarvis_console::{
    CONNECTION_APOLOGY, MUSIC_APOLOGY, NowPlaying, Orchestrator, Outcome, QuickCommand, Role,
    Status,
};

mod common;
use common::{RecordingSpeech, ScriptedBackend, drain_statuses};

fn orchestrator(
    backend: &ScriptedBackend,
    speech: &Arc<RecordingSpeech>,
) -> Orchestrator<ScriptedBackend> {
    let coordinator = SpeechCoordinator::new(speech.clone());
    Orchestrator::new(backend.clone(), coordinator, DEFAULT_GREETING)
}

fn roles(orchestrator: &Orchestrator<ScriptedBackend>) -> Vec<Role> {
    orchestrator
        .store()
        .messages()
        .iter()
        .map(jarvis_console::Message::role)
        .collect()
}

fn last_content(orchestrator: &Orchestrator<ScriptedBackend>) -> String {
    orchestrator
        .store()
        .last()
        .map(|m| m.content().to_string())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_plain_reply_status_sequence() {
    let backend = ScriptedBackend::new();
    backend.reply("The time is half past four, sir.").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);
    let mut statuses = jarvis.subscribe_status();

    let outcome = jarvis.handle_user_input("What time is it?").await;
    assert_eq!(outcome, Outcome::Replied);
    assert_eq!(jarvis.status(), Status::Speaking);

    jarvis
        .handle_speech_event(SpeechEvent::SpeakingEnded {
            utterance: UtteranceId(1),
        })
        .await;

    assert_eq!(
        drain_statuses(&mut statuses),
        [Status::Thinking, Status::Speaking, Status::Idle]
    );
    assert_eq!(roles(&jarvis), [Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(last_content(&jarvis), "The time is half past four, sir.");
    assert_eq!(speech.spoken().await, ["The time is half past four, sir."]);
}

#[tokio::test]
async fn test_unsupported_speech_skips_speaking() {
    let backend = ScriptedBackend::new();
    backend.reply("Certainly.").await;
    let speech = RecordingSpeech::unsupported();
    let mut jarvis = orchestrator(&backend, &speech);
    let mut statuses = jarvis.subscribe_status();

    assert_eq!(jarvis.handle_user_input("Hello").await, Outcome::Replied);

    assert_eq!(drain_statuses(&mut statuses), [Status::Thinking, Status::Idle]);
    assert!(speech.calls().await.is_empty());
    assert_eq!(last_content(&jarvis), "Certainly.");
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let backend = ScriptedBackend::new();
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);
    let mut statuses = jarvis.subscribe_status();

    assert_eq!(jarvis.handle_user_input("").await, Outcome::Ignored);
    assert_eq!(jarvis.handle_user_input("  \n\t ").await, Outcome::Ignored);

    assert_eq!(jarvis.store().len(), 1);
    assert!(drain_statuses(&mut statuses).is_empty());
    assert!(backend.calls().await.is_empty());
}

#[tokio::test]
async fn test_music_directive_with_artist() {
    let backend = ScriptedBackend::new();
    backend
        .reply(r#"PLAY_SONG::{"song":"Strobe","artist":"deadmau5"}"#)
        .await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    let outcome = jarvis.handle_user_input("Play Strobe").await;
    assert_eq!(outcome, Outcome::PlayingMusic);

    assert_eq!(
        jarvis.now_playing(),
        Some(&NowPlaying {
            song: "Strobe".to_string(),
            artist: Some("deadmau5".to_string()),
        })
    );
    let expected = "Of course. Opening YouTube to play \"Strobe\" by deadmau5.";
    assert_eq!(last_content(&jarvis), expected);
    assert_eq!(speech.spoken().await, [expected]);
}

#[tokio::test]
async fn test_music_directive_without_artist() {
    let backend = ScriptedBackend::new();
    backend.reply(r#"PLAY_SONG::{"song":"Strobe"}"#).await;
    let speech = RecordingSpeech::unsupported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.handle_user_input("Play Strobe").await;

    assert_eq!(
        last_content(&jarvis),
        "Of course. Opening YouTube to play \"Strobe\"."
    );
    assert_eq!(jarvis.now_playing().and_then(NowPlaying::artist), None);
}

#[tokio::test]
async fn test_malformed_directive_keeps_now_playing() {
    let backend = ScriptedBackend::new();
    backend
        .reply(r#"PLAY_SONG::{"song":"Strobe","artist":"deadmau5"}"#)
        .await
        .reply("PLAY_SONG::{not json")
        .await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.handle_user_input("Play Strobe").await;
    let before = jarvis.now_playing().cloned();
    let spoken_before = speech.spoken().await.len();

    let mut statuses = jarvis.subscribe_status();
    let outcome = jarvis.handle_user_input("Play something else").await;

    assert_eq!(outcome, Outcome::DirectiveFailed);
    assert_eq!(last_content(&jarvis), MUSIC_APOLOGY);
    assert_eq!(jarvis.now_playing().cloned(), before);
    assert_eq!(speech.spoken().await.len(), spoken_before);
    assert_eq!(drain_statuses(&mut statuses), [Status::Thinking, Status::Idle]);
}

#[tokio::test]
async fn test_backend_failure_apologizes() {
    let backend = ScriptedBackend::new();
    backend.fail("connection refused").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);
    let mut statuses = jarvis.subscribe_status();

    let outcome = jarvis.handle_user_input("Hello?").await;

    assert_eq!(outcome, Outcome::BackendFailed);
    assert_eq!(last_content(&jarvis), CONNECTION_APOLOGY);
    assert_ne!(CONNECTION_APOLOGY, MUSIC_APOLOGY);
    assert_eq!(
        drain_statuses(&mut statuses),
        [Status::Thinking, Status::Error, Status::Idle]
    );
    assert_eq!(jarvis.status(), Status::Idle);
    // The user's message is kept
    assert_eq!(roles(&jarvis), [Role::Assistant, Role::User, Role::Assistant]);
    assert!(speech.spoken().await.is_empty());
}

#[tokio::test]
async fn test_one_user_and_one_assistant_message_per_exchange() {
    let backend = ScriptedBackend::new();
    backend
        .reply("One.")
        .await
        .fail("timeout")
        .await
        .reply("PLAY_SONG::[]")
        .await
        .reply(r#"PLAY_SONG::{"song":"Strobe"}"#)
        .await;
    let speech = RecordingSpeech::unsupported();
    let mut jarvis = orchestrator(&backend, &speech);

    for input in ["a", "b", "c", "d"] {
        let before = jarvis.store().len();
        jarvis.handle_user_input(input).await;
        let added: Vec<Role> = jarvis
            .store()
            .since(before)
            .iter()
            .map(jarvis_console::Message::role)
            .collect();
        assert_eq!(added, [Role::User, Role::Assistant], "input {input}");
        assert_eq!(jarvis.status(), Status::Idle);
    }
}

#[tokio::test]
async fn test_history_excludes_current_message() {
    let backend = ScriptedBackend::new();
    backend.reply("First reply.").await.reply("Second reply.").await;
    let speech = RecordingSpeech::unsupported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.handle_user_input("First").await;
    jarvis.handle_user_input("Second").await;

    let calls = backend.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].user_text, "First");
    assert_eq!(calls[0].history, [DEFAULT_GREETING]);
    assert_eq!(calls[1].user_text, "Second");
    assert_eq!(
        calls[1].history,
        [DEFAULT_GREETING, "First", "First reply."]
    );
}

#[tokio::test]
async fn test_music_quick_command_matches_typed_prompt() {
    let backend = ScriptedBackend::new();
    backend.reply("Right away.").await.reply("Right away.").await;
    let speech = RecordingSpeech::unsupported();

    let mut typed = orchestrator(&backend, &speech);
    let typed_outcome = typed
        .handle_user_input("Play some upbeat electronic music")
        .await;

    let mut quick = orchestrator(&backend, &speech);
    let quick_outcome = quick.handle_quick_command("music").await;

    assert_eq!(typed_outcome, quick_outcome);
    let calls = backend.calls().await;
    assert_eq!(calls[0].user_text, calls[1].user_text);
    assert_eq!(calls[1].user_text, QuickCommand::Music.prompt());

    let contents = |o: &Orchestrator<ScriptedBackend>| -> Vec<String> {
        o.store()
            .messages()
            .iter()
            .map(|m| m.content().to_string())
            .collect()
    };
    assert_eq!(contents(&typed), contents(&quick));
}

#[tokio::test]
async fn test_unknown_quick_command_is_ignored() {
    let backend = ScriptedBackend::new();
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    assert_eq!(jarvis.handle_quick_command("lights").await, Outcome::Ignored);
    assert_eq!(jarvis.store().len(), 1);
    assert_eq!(jarvis.status(), Status::Idle);
}

#[tokio::test]
async fn test_transcript_runs_exchange_after_listening_ends() {
    let backend = ScriptedBackend::new();
    backend.reply("It is sunny.").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    assert!(jarvis.start_listening().await);
    assert_eq!(jarvis.status(), Status::Listening);

    let pending = jarvis
        .handle_speech_event(SpeechEvent::Transcript {
            session: SessionId(1),
            text: "How is the weather?".to_string(),
        })
        .await;
    assert_eq!(pending, None);
    assert_eq!(jarvis.store().len(), 1);

    let outcome = jarvis
        .handle_speech_event(SpeechEvent::ListeningEnded {
            session: SessionId(1),
        })
        .await;
    assert_eq!(outcome, Some(Outcome::Replied));

    let calls = backend.calls().await;
    assert_eq!(calls[0].user_text, "How is the weather?");
    assert_eq!(last_content(&jarvis), "It is sunny.");
    assert_eq!(jarvis.status(), Status::Speaking);
}

#[tokio::test]
async fn test_stale_transcript_is_ignored() {
    let backend = ScriptedBackend::new();
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.start_listening().await;
    assert_eq!(jarvis.stop_listening().await, None);
    jarvis.start_listening().await;

    let outcome = jarvis
        .handle_speech_event(SpeechEvent::Transcript {
            session: SessionId(1),
            text: "old words".to_string(),
        })
        .await;

    assert_eq!(outcome, None);
    assert!(backend.calls().await.is_empty());
    assert_eq!(jarvis.status(), Status::Listening);
}

#[tokio::test]
async fn test_stale_listening_end_does_not_clobber_speaking() {
    let backend = ScriptedBackend::new();
    backend.reply("Of course.").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.start_listening().await;
    jarvis.stop_listening().await;
    jarvis.handle_user_input("Typed meanwhile").await;
    assert_eq!(jarvis.status(), Status::Speaking);

    jarvis
        .handle_speech_event(SpeechEvent::ListeningEnded {
            session: SessionId(1),
        })
        .await;
    assert_eq!(jarvis.status(), Status::Speaking);
}

#[tokio::test]
async fn test_typed_input_closes_capture_before_reply() {
    let backend = ScriptedBackend::new();
    backend.reply("Of course, sir.").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);
    let mut statuses = jarvis.subscribe_status();

    assert!(jarvis.start_listening().await);
    let outcome = jarvis.handle_user_input("typed while the mic is open").await;

    assert_eq!(outcome, Outcome::Replied);
    assert!(!jarvis.is_listening());
    assert_eq!(jarvis.status(), Status::Speaking);
    assert_eq!(
        speech.calls().await,
        ["start 1", "stop 1", "speak Of course, sir."]
    );
    assert_eq!(
        drain_statuses(&mut statuses),
        [
            Status::Listening,
            Status::Idle,
            Status::Thinking,
            Status::Speaking
        ]
    );

    // Whatever the closed session captured never becomes input
    let late = jarvis
        .handle_speech_event(SpeechEvent::Transcript {
            session: SessionId(1),
            text: "Of course, sir.".to_string(),
        })
        .await;
    assert_eq!(late, None);
    assert_eq!(backend.calls().await.len(), 1);
}

#[tokio::test]
async fn test_backend_failure_while_listening_settles_idle() {
    let backend = ScriptedBackend::new();
    backend.fail("connection refused").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);
    let mut statuses = jarvis.subscribe_status();

    jarvis.start_listening().await;
    let outcome = jarvis.handle_user_input("Hello?").await;

    assert_eq!(outcome, Outcome::BackendFailed);
    assert!(!jarvis.is_listening());
    assert_eq!(jarvis.status(), Status::Idle);
    assert_eq!(speech.calls().await, ["start 1", "stop 1"]);
    assert_eq!(
        drain_statuses(&mut statuses),
        [
            Status::Listening,
            Status::Idle,
            Status::Thinking,
            Status::Error,
            Status::Idle
        ]
    );
}

#[tokio::test]
async fn test_malformed_directive_while_listening_settles_idle() {
    let backend = ScriptedBackend::new();
    backend.reply("PLAY_SONG::not json").await;
    let speech = RecordingSpeech::supported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.start_listening().await;
    let outcome = jarvis.handle_user_input("Play something").await;

    assert_eq!(outcome, Outcome::DirectiveFailed);
    assert!(!jarvis.is_listening());
    assert_eq!(jarvis.status(), Status::Idle);
}

#[tokio::test]
async fn test_clear_now_playing() {
    let backend = ScriptedBackend::new();
    backend.reply(r#"PLAY_SONG::{"song":"Strobe"}"#).await;
    let speech = RecordingSpeech::unsupported();
    let mut jarvis = orchestrator(&backend, &speech);

    jarvis.handle_user_input("Play Strobe").await;
    assert!(jarvis.clear_now_playing().is_some());
    assert!(jarvis.now_playing().is_none());
}
