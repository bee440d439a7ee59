//! Keyword-to-command handoff integration tests

use std::collections::HashSet;

use podium::engine::simulated::{ScriptedEvent, SimulatedRecognitionEngine};
use podium::{
    AccessArbiter, CommandEvent, ConsumerId, HandsFreeController, HandsFreeMode, SessionState,
};

mod common;

use common::{
    EventLog, fast_hands_free_config, fast_recognition_config, recognition_saying, settle,
    silent_recognition,
};

fn controller(arbiter: &AccessArbiter) -> HandsFreeController {
    HandsFreeController::new(
        arbiter.clone(),
        &fast_hands_free_config(),
        &fast_recognition_config(),
    )
}

fn collect_commands(controller: &HandsFreeController) -> EventLog<CommandEvent> {
    let log = EventLog::new();
    let sink = log.clone();
    controller.subscribe(move |event| sink.push(event.clone()));
    log
}

#[tokio::test(start_paused = true)]
async fn command_in_same_utterance_needs_no_second_session() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);
    let commands = collect_commands(&controller);

    let keyword_engine = recognition_saying(20, "estorm crea un archivo");
    assert!(controller.enable(Box::new(keyword_engine), Box::new(silent_recognition())));

    settle(200).await;

    assert_eq!(
        commands.entries(),
        vec![CommandEvent {
            command: "crea un archivo".to_string(),
            keyword: "storm".to_string(),
        }]
    );
    // Back to keyword listening, re-armed
    assert_eq!(controller.mode(), HandsFreeMode::Keyword);
    assert_eq!(
        controller.keyword_session().state(),
        SessionState::Listening
    );
    // The command session never ran
    assert_eq!(controller.command_session().state(), SessionState::Ready);
}

#[tokio::test(start_paused = true)]
async fn bare_keyword_hands_off_to_command_capture() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);
    let commands = collect_commands(&controller);

    let keyword_engine = recognition_saying(20, "hola");
    let command_engine = recognition_saying(50, "abre el panel");
    assert!(controller.enable(Box::new(keyword_engine), Box::new(command_engine)));

    settle(400).await;

    assert_eq!(
        commands.entries(),
        vec![CommandEvent {
            command: "abre el panel".to_string(),
            keyword: "hola".to_string(),
        }]
    );
    assert_eq!(controller.mode(), HandsFreeMode::Keyword);
    assert_eq!(
        controller.keyword_session().state(),
        SessionState::Listening
    );
}

#[tokio::test(start_paused = true)]
async fn command_timeout_abandons_silently() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);
    let commands = collect_commands(&controller);

    let keyword_engine = recognition_saying(20, "hola");
    // The command session hears nothing; command_timeout_ms = 800
    assert!(controller.enable(Box::new(keyword_engine), Box::new(silent_recognition())));

    settle(100).await;
    assert_eq!(controller.mode(), HandsFreeMode::CommandCapture);

    settle(1_200).await;
    assert!(commands.is_empty());
    assert_eq!(controller.mode(), HandsFreeMode::Keyword);
    assert_eq!(
        controller.keyword_session().state(),
        SessionState::Listening
    );
}

#[tokio::test(start_paused = true)]
async fn non_keyword_utterances_are_ignored() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);
    let commands = collect_commands(&controller);

    let keyword_engine = recognition_saying(20, "buenos dias");
    assert!(controller.enable(Box::new(keyword_engine), Box::new(silent_recognition())));

    settle(200).await;

    assert!(commands.is_empty());
    assert_eq!(controller.mode(), HandsFreeMode::Keyword);
    // The continuous session keeps running
    assert_eq!(
        controller.keyword_session().state(),
        SessionState::Listening
    );
}

#[tokio::test(start_paused = true)]
async fn keyword_and_command_sessions_never_listen_together() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);

    // Record every listening transition from both sessions in one log
    let transitions: EventLog<(ConsumerId, SessionState, SessionState)> = EventLog::new();
    for session in [controller.keyword_session(), controller.command_session()] {
        let consumer = session.consumer();
        let sink = transitions.clone();
        session.subscribe(move |event| {
            if let podium::SessionEvent::StateChanged { from, to } = event {
                sink.push((consumer, *from, *to));
            }
        });
    }

    let keyword_engine = recognition_saying(20, "hola");
    let command_engine = recognition_saying(50, "abre el panel");
    assert!(controller.enable(Box::new(keyword_engine), Box::new(command_engine)));

    settle(400).await;

    // Replay the observed transitions: at no point may two consumers be in
    // Listening simultaneously
    let mut listening: HashSet<ConsumerId> = HashSet::new();
    for (consumer, from, to) in transitions.entries() {
        if from == SessionState::Listening {
            listening.remove(&consumer);
        }
        if to == SessionState::Listening {
            listening.insert(consumer);
        }
        assert!(
            listening.len() <= 1,
            "two concurrent listening sessions: {listening:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn disable_stops_keyword_listening() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);

    assert!(controller.enable(
        Box::new(silent_recognition()),
        Box::new(silent_recognition())
    ));
    settle(10).await;
    assert_eq!(
        controller.keyword_session().state(),
        SessionState::Listening
    );

    controller.disable();
    settle(50).await;
    assert_eq!(controller.mode(), HandsFreeMode::Disabled);
    assert_eq!(controller.keyword_session().state(), SessionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn soft_error_rearms_keyword_listening() {
    let arbiter = AccessArbiter::new();
    let controller = controller(&arbiter);
    let commands = collect_commands(&controller);

    let keyword_engine = SimulatedRecognitionEngine::available();
    let scripts = keyword_engine.script_queue();
    scripts.push(vec![ScriptedEvent::error(
        20,
        podium::EngineErrorCode::NoSpeech,
    )]);
    // After the cooldown restart, the next session hears a keyword
    scripts.push(vec![ScriptedEvent::final_result(20, "estorm dime la hora")]);

    assert!(controller.enable(Box::new(keyword_engine), Box::new(silent_recognition())));

    settle(30).await;
    assert_eq!(controller.keyword_session().state(), SessionState::Error);

    settle(400).await;
    assert_eq!(
        commands.entries(),
        vec![CommandEvent {
            command: "dime la hora".to_string(),
            keyword: "storm".to_string(),
        }]
    );
    assert_eq!(controller.mode(), HandsFreeMode::Keyword);
}
