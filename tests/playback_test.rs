//! Playback behavior through the player handle
//!
//! The recording engine stands in for the speech engine; tests fire its
//! callbacks by hand, including late ones, and check the state and events
//! the player publishes.

mod common;

use common::{
    complete_current, is_disconnected, next_event, player_with_engine, settle, Call, GatedSource,
    RecordingEngine,
};
use pdftalk::document::TextFileSource;
use pdftalk::playback::{Event, HighlightRange, Phase, PlaybackOptions, Player};
use pdftalk::TalkError;
use std::fs;
use std::thread;

const THREE_PAGES: [&str; 3] = ["First page.", "Second page.", "Third page."];

fn state_events(events: &[Event]) -> Vec<(Phase, Option<usize>)> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StateChanged(state) => Some((state.phase, state.current_index)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_play_complete_pause_ignores_late_completion() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    assert_eq!(player.load_document(THREE_PAGES).unwrap(), 3);

    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.current_index, Some(0));

    player.play().unwrap();
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.phase, Phase::Playing);
    assert_eq!(snapshot.current_index, Some(0));

    let first = complete_current(&player, &engine);
    assert_eq!(first.section, 0);
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.phase, Phase::Playing);
    assert_eq!(snapshot.current_index, Some(1));

    let second = engine.last_spoken().unwrap();
    assert_eq!(second.section, 1);

    player.pause().unwrap();
    let paused = player.snapshot().unwrap();
    assert_eq!(paused.phase, Phase::Paused);

    let subscription = player.subscribe();
    engine.finish(second);
    assert!(settle(&player, &subscription).is_empty());
    assert_eq!(player.snapshot().unwrap(), paused);
    assert_eq!(engine.spoken().len(), 2);
}

#[test]
fn test_resume_after_pause_speaks_same_section() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();

    player.play().unwrap();
    complete_current(&player, &engine);
    player.pause().unwrap();
    player.play().unwrap();

    let spoken = engine.spoken();
    assert_eq!(spoken.len(), 3);
    assert_eq!(spoken[2].section, 1);
    // A fresh dispatch, not the paused one
    assert_ne!(spoken[2], spoken[1]);
}

#[test]
fn test_next_at_last_index_redispatches() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();

    player.seek(2).unwrap();
    player.play().unwrap();
    let before = engine.last_spoken().unwrap();
    assert_eq!(before.section, 2);

    player.next().unwrap();
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.phase, Phase::Playing);

    let after = engine.last_spoken().unwrap();
    assert_eq!(after.section, 2);
    assert_ne!(after, before);

    // The cancelled utterance finishing late changes nothing
    engine.finish(before);
    assert_eq!(player.snapshot().unwrap().phase, Phase::Playing);

    engine.finish(after);
    assert_eq!(player.snapshot().unwrap().phase, Phase::Finished);
}

#[test]
fn test_navigation_while_idle_keeps_phase() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();

    player.prev().unwrap();
    assert_eq!(player.snapshot().unwrap().current_index, Some(0));

    player.next().unwrap();
    player.next().unwrap();
    player.next().unwrap();
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(engine.spoken().is_empty());

    player.seek(99).unwrap();
    assert_eq!(player.snapshot().unwrap().current_index, Some(2));
}

#[test]
fn test_range_for_other_utterance_ignored() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();
    player.play().unwrap();

    let stale = engine.last_spoken().unwrap();
    player.next().unwrap();
    let current = engine.last_spoken().unwrap();

    let subscription = player.subscribe();
    engine.progress(stale, 0, 5);
    assert!(settle(&player, &subscription).is_empty());
    assert_eq!(player.highlight().unwrap(), None);

    engine.progress(current, 7, 11);
    let events = settle(&player, &subscription);
    assert_eq!(
        events,
        vec![Event::HighlightRangeChanged {
            section: 1,
            start: 7,
            end: 11
        }]
    );
    assert_eq!(
        player.highlight().unwrap(),
        Some(HighlightRange { start: 7, end: 11 })
    );
}

#[test]
fn test_reload_while_playing_resets_and_cancels() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();

    player.play().unwrap();
    complete_current(&player, &engine);
    let in_flight = engine.last_spoken().unwrap();
    assert_eq!(in_flight.section, 1);
    let stops = engine.stops();

    player.load_document(["New one.", "New two."]).unwrap();
    assert_eq!(engine.stops(), stops + 1);

    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.current_index, Some(0));
    assert_eq!(snapshot.total_sections, 2);

    // Completion of the old document's utterance arrives late
    engine.finish(in_flight);
    assert_eq!(player.snapshot().unwrap(), snapshot);

    player.play().unwrap();
    assert_eq!(engine.spoken_text().last().unwrap(), "New one.");
}

#[test]
fn test_engine_reporting_done_on_stop_does_not_advance() {
    let engine = RecordingEngine::done_on_stop();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();

    player.play().unwrap();
    player.pause().unwrap();
    assert_eq!(player.snapshot().unwrap().current_index, Some(0));

    player.play().unwrap();
    player.seek(2).unwrap();
    let snapshot = player.snapshot().unwrap();
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.phase, Phase::Playing);
    assert_eq!(engine.last_spoken().unwrap().section, 2);
}

#[test]
fn test_engine_error_stops_playback() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();
    player.play().unwrap();

    let subscription = player.subscribe();
    engine.fail(engine.last_spoken().unwrap());
    let events = settle(&player, &subscription);

    assert_eq!(state_events(&events), vec![(Phase::Idle, Some(0))]);
    assert!(matches!(events.last(), Some(Event::EngineError { .. })));

    // Recoverable: play again at the same section
    player.play().unwrap();
    assert_eq!(player.snapshot().unwrap().phase, Phase::Playing);
}

#[test]
fn test_every_transition_publishes_state() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    let subscription = player.subscribe();

    player.load_document(["One.", "Two."]).unwrap();
    player.play().unwrap();
    complete_current(&player, &engine);
    complete_current(&player, &engine);
    player.stop().unwrap();

    let events = settle(&player, &subscription);
    assert_eq!(
        state_events(&events),
        vec![
            (Phase::Idle, Some(0)),
            (Phase::Playing, Some(0)),
            (Phase::Playing, Some(1)),
            (Phase::Finished, Some(1)),
            (Phase::Idle, Some(1)),
        ]
    );
}

#[test]
fn test_late_subscriber_reads_snapshot() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();
    player.play().unwrap();

    let late = player.subscribe();
    assert!(late.try_recv().is_none());
    let snapshot = player.snapshot().unwrap();
    assert!(snapshot.is_playing());
    assert_eq!(snapshot.page_label(), "1/3");

    player.next().unwrap();
    match next_event(&late) {
        Event::StateChanged(state) => assert_eq!(state.current_index, Some(1)),
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_commands_without_document_or_engine() {
    let player = Player::spawn(PlaybackOptions::default()).unwrap();
    assert!(matches!(player.play(), Err(TalkError::NoDocumentLoaded)));
    assert!(matches!(player.next(), Err(TalkError::NoDocumentLoaded)));
    assert_eq!(player.snapshot().unwrap().current_index, None);

    player.load_document(THREE_PAGES).unwrap();
    assert!(matches!(player.play(), Err(TalkError::EngineNotReady)));
    assert!(!player.snapshot().unwrap().tts_ready);

    let engine = RecordingEngine::new();
    player.attach_engine(Box::new(engine.clone())).unwrap();
    assert!(player.snapshot().unwrap().tts_ready);
    player.play().unwrap();
    assert_eq!(engine.spoken().len(), 1);
}

#[test]
fn test_settings_reach_engine_for_next_utterance() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();
    player.play().unwrap();

    let subscription = player.subscribe();
    player.set_rate(100).unwrap();
    player.set_voice(0).unwrap();
    assert!(settle(&player, &subscription).is_empty());

    let calls = engine.calls();
    assert!(calls.contains(&Call::Rate(2.0)));
    assert!(calls.contains(&Call::Voice("karen".to_string())));
    // The current utterance keeps playing
    assert_eq!(engine.spoken().len(), 1);
    assert_eq!(player.snapshot().unwrap().settings.rate_percent, 100);
}

#[test]
fn test_voice_catalog_from_engine() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);

    let voices = player.voices().unwrap();
    let locales: Vec<&str> = voices.iter().map(|v| v.locale.as_str()).collect();
    assert_eq!(locales, vec!["en-AU", "en-GB", "en-US"]);
    // Defaults to the preferred country
    assert_eq!(player.snapshot().unwrap().settings.voice_index, 2);
}

#[test]
fn test_newer_load_supersedes_older() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);

    let (source, release) = GatedSource::new(&["Old page one.", "Old page two."]);
    let slow = player.spawn_load(Box::new(source)).unwrap();
    assert_eq!(player.load_document(["Newest."]).unwrap(), 1);
    release.send(()).unwrap();

    match slow.join().unwrap() {
        Err(TalkError::LoadSuperseded) => {}
        other => panic!("expected LoadSuperseded, got {:?}", other),
    }
    assert_eq!(player.section_count().unwrap(), 1);
    assert_eq!(player.section(0).unwrap().text, "Newest.");
}

#[test]
fn test_background_load_installs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.txt");
    fs::write(&path, "Page one.\x0c  \x0cPage three.\x0c").unwrap();

    let player = Player::spawn(PlaybackOptions::default()).unwrap();
    let loaded = player
        .spawn_load(Box::new(TextFileSource::new(&path)))
        .unwrap()
        .join()
        .unwrap()
        .unwrap();

    assert_eq!(loaded, 2);
    let section = player.section(1).unwrap();
    assert_eq!(section.text, "Page three.");
    assert_eq!(section.source_page, 3);
}

#[test]
fn test_failed_load_keeps_previous_document() {
    let player = Player::spawn(PlaybackOptions::default()).unwrap();
    player.load_document(THREE_PAGES).unwrap();

    let missing = TextFileSource::new("/nonexistent/pdftalk/missing.txt");
    assert!(matches!(
        player.load_from(&missing),
        Err(TalkError::LoadFailed(_))
    ));
    assert_eq!(player.section_count().unwrap(), 3);
}

#[test]
fn test_handles_usable_from_many_threads() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let player = player.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    if i % 2 == 0 {
                        player.toggle_play_pause().unwrap();
                    } else {
                        player.next().unwrap();
                        player.prev().unwrap();
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let snapshot = player.snapshot().unwrap();
    assert!(snapshot.current_index.unwrap() < 3);
    // Never more than one utterance is left in flight
    let spoken = engine.spoken().len();
    assert!(engine.stops() + 1 >= spoken);
}

#[test]
fn test_shutdown_disconnects_every_handle() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    player.load_document(THREE_PAGES).unwrap();
    player.play().unwrap();

    let other = player.clone();
    player.shutdown().unwrap();

    assert!(engine.calls().last() == Some(&Call::Stop));
    assert!(is_disconnected(other.play()));
    assert!(matches!(other.snapshot(), Err(TalkError::Disconnected)));
    // A second shutdown is harmless
    assert!(other.shutdown().is_ok());
}

#[test]
fn test_dropping_last_handle_stops_loop() {
    let engine = RecordingEngine::new();
    let player = player_with_engine(&engine);
    let subscription = player.subscribe();
    player.load_document(THREE_PAGES).unwrap();
    player.play().unwrap();

    // Another handle keeps the loop running
    let other = player.clone();
    drop(player);
    assert_eq!(other.section_count().unwrap(), 3);
    assert!(engine.is_attached());

    // The engine's listener alone does not
    drop(other);
    assert!(!engine.is_attached());
    assert_eq!(engine.calls().last(), Some(&Call::Stop));
    while subscription.recv().is_some() {}
}
