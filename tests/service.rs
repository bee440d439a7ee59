//! Speech service facade integration tests

use podium::engine::simulated::SimulatedSynthesisEngine;
use podium::{CommandEvent, Config, ServiceEngines, SessionState, SpeechConfig, SpeechService};

mod common;

use common::{
    EventLog, fast_hands_free_config, fast_recognition_config, recognition_saying, settle,
    silent_recognition,
};

fn test_config() -> Config {
    Config {
        recognition: fast_recognition_config(),
        hands_free: fast_hands_free_config(),
        preferred_languages: vec!["es-ES".to_string(), "es".to_string()],
        ..Config::default()
    }
}

#[tokio::test(start_paused = true)]
async fn full_stack_handles_a_hands_free_exchange() {
    let mut service = SpeechService::new(test_config());
    let initialized = service.initialize(ServiceEngines {
        dictation: Box::new(silent_recognition()),
        keyword: Box::new(recognition_saying(20, "estorm abre la consola")),
        command: Box::new(silent_recognition()),
        synthesis: Box::new(SimulatedSynthesisEngine::new().with_ms_per_word(10)),
    });
    assert!(initialized);

    let commands: EventLog<CommandEvent> = EventLog::new();
    let sink = commands.clone();
    service.subscribe_commands(move |event| sink.push(event.clone()));

    settle(200).await;
    assert_eq!(
        commands.entries(),
        vec![CommandEvent {
            command: "abre la consola".to_string(),
            keyword: "storm".to_string(),
        }]
    );

    // Speak a reply through the queue
    let id = service.speak("claro", &SpeechConfig::default()).unwrap();
    settle(200).await;
    assert!(!id.is_nil());
}

#[tokio::test(start_paused = true)]
async fn dictation_yields_to_active_keyword_listening() {
    let mut service = SpeechService::new(test_config());
    assert!(service.initialize(ServiceEngines {
        dictation: Box::new(silent_recognition()),
        keyword: Box::new(silent_recognition()),
        command: Box::new(silent_recognition()),
        synthesis: Box::new(SimulatedSynthesisEngine::new()),
    }));
    settle(10).await;

    // The keyword listener holds the recognition engine
    assert_eq!(
        service.hands_free().keyword_session().state(),
        SessionState::Listening
    );
    assert!(!service.start_listening());

    // Hand the engine over to dictation
    service.hands_free().disable();
    settle(50).await;
    assert!(service.start_listening());
    settle(10).await;
    assert_eq!(service.dictation().state(), SessionState::Listening);

    service.stop_listening();
    settle(50).await;
    assert_eq!(service.dictation().state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn hands_free_can_be_disabled_in_config() {
    let config = Config {
        hands_free: podium::HandsFreeConfig {
            enabled: false,
            ..fast_hands_free_config()
        },
        ..test_config()
    };
    let mut service = SpeechService::new(config);
    assert!(service.initialize(ServiceEngines {
        dictation: Box::new(silent_recognition()),
        keyword: Box::new(silent_recognition()),
        command: Box::new(silent_recognition()),
        synthesis: Box::new(SimulatedSynthesisEngine::new()),
    }));
    settle(10).await;

    // Dictation owns the engine from the start
    assert!(service.start_listening());
}

#[tokio::test(start_paused = true)]
async fn snapshot_covers_every_component() {
    let mut service = SpeechService::new(test_config());
    assert!(service.initialize(ServiceEngines {
        dictation: Box::new(silent_recognition()),
        keyword: Box::new(silent_recognition()),
        command: Box::new(silent_recognition()),
        synthesis: Box::new(SimulatedSynthesisEngine::new()),
    }));
    settle(10).await;

    let snapshot = service.debug_snapshot();
    assert!(snapshot.contains("access records"));
    assert!(snapshot.contains("dictation"));
    assert!(snapshot.contains("keyword-listener"));
    assert!(snapshot.contains("command-capture"));
    assert!(snapshot.contains("hands-free"));
    assert!(snapshot.contains("synthesis"));
}

#[tokio::test(start_paused = true)]
async fn transcript_reset_clears_dictation_text() {
    let config = Config {
        hands_free: podium::HandsFreeConfig {
            enabled: false,
            ..fast_hands_free_config()
        },
        ..test_config()
    };
    let mut service = SpeechService::new(config);
    assert!(service.initialize(ServiceEngines {
        dictation: Box::new(recognition_saying(20, "escribe un correo")),
        keyword: Box::new(silent_recognition()),
        command: Box::new(silent_recognition()),
        synthesis: Box::new(SimulatedSynthesisEngine::new()),
    }));

    assert!(service.start_listening());
    settle(100).await;
    assert_eq!(service.dictation().transcript(), "escribe un correo");

    service.reset_transcript();
    assert!(service.dictation().transcript().is_empty());
}
