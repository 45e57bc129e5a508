use assert_matches::assert_matches;
use tadak::stats::compute;
use tadak::{
    CompletionReason, Language, ManualClock, ModeKind, Phase, PracticeMode, PracticeSettings,
    SessionEvent, SessionOrchestrator, SessionState, TypingEvaluator, TypingStats,
};

/// End-to-end checks of the evaluator and session flow against simulated time

#[test]
fn correct_plus_errors_covers_every_typed_char() {
    let target = "다람쥐 헌 쳇바퀴에 타고파";
    let typed_variants = ["", "다", "다랑", "다람쥐 헌", "타람쥐 헌 챗바퀴에 타고파"];
    for typed in typed_variants {
        let stats = compute(typed, target, 2.0);
        assert_eq!(
            stats.correct_chars + stats.errors,
            typed.chars().count(),
            "typed: {typed}"
        );
    }
}

#[test]
fn empty_input_scores_perfect_accuracy() {
    let stats = compute("", "anything", 0.0);
    assert_eq!(stats.accuracy, 100);
    assert_eq!(stats.wpm, 0);
}

#[test]
fn repeated_input_after_finish_changes_nothing() {
    let clock = ManualClock::new();
    let mut evaluator = TypingEvaluator::with_clock(
        "abc",
        PracticeMode::defaults_for(ModeKind::Sentence),
        clock.clone(),
    );
    evaluator.handle_input("a");
    clock.advance_secs(3.0);
    assert!(evaluator.handle_input("abc").is_some());
    let finished_stats = *evaluator.stats();

    clock.advance_secs(10.0);
    assert_eq!(evaluator.handle_input("abc"), None);
    assert_eq!(evaluator.on_tick(), None);
    assert_eq!(*evaluator.stats(), finished_stats);
    assert_eq!(evaluator.phase(), Phase::Finished);
}

#[test]
fn word_mode_completes_once_input_overruns_target() {
    let mut evaluator = TypingEvaluator::with_clock(
        "hello",
        PracticeMode::defaults_for(ModeKind::Word),
        ManualClock::new(),
    );
    assert_eq!(evaluator.handle_input("hello"), None);
    let completion = evaluator.handle_input("helloo").unwrap();
    assert_eq!(completion.reason, CompletionReason::Completed);
    assert_eq!(completion.input, "helloo");
}

#[test]
fn accuracy_challenge_stops_at_error_limit() {
    let mode = PracticeMode::AccuracyChallenge {
        max_errors: 3,
        min_accuracy: 0,
    };
    let mut evaluator = TypingEvaluator::with_clock("abcdefgh", mode, ManualClock::new());

    assert_eq!(evaluator.handle_input("x"), None);
    assert_eq!(evaluator.handle_input("xy"), None);
    let completion = evaluator.handle_input("xyz").unwrap();
    assert_eq!(completion.reason, CompletionReason::MaxErrors);
    assert_eq!(completion.stats.errors, 3);

    // the fourth mistake arrives after the latch
    assert_eq!(evaluator.handle_input("xyzw"), None);
    assert_eq!(evaluator.completion_reason(), Some(CompletionReason::MaxErrors));
}

#[test]
fn time_attack_ends_on_tick_at_limit() {
    let clock = ManualClock::new();
    let mut evaluator = TypingEvaluator::with_clock(
        "the clock is ticking",
        PracticeMode::TimeAttack { time_limit_sec: 30 },
        clock.clone(),
    );
    evaluator.handle_input("t");

    clock.advance_secs(15.0);
    assert_eq!(evaluator.on_tick(), None);
    assert_eq!(evaluator.remaining_time(), Some(15.0));

    clock.advance_secs(15.0);
    let completion = evaluator.on_tick().unwrap();
    assert_eq!(completion.reason, CompletionReason::TimeUp);
    assert_eq!(evaluator.remaining_time(), Some(0.0));
    assert!(!evaluator.is_ticking());
}

#[test]
fn running_mean_over_three_items() {
    let item = |wpm| TypingStats {
        wpm,
        ..TypingStats::default()
    };
    let state = SessionState::new(vec!["a".into(), "b".into(), "c".into()])
        .fold(&item(60), "a")
        .advance()
        .fold(&item(80), "b")
        .advance()
        .fold(&item(100), "c");
    assert_eq!(state.cumulative().wpm, 80);
    assert!(!state.has_next());
}

#[test]
fn session_timings_feed_cumulative_wpm() {
    let clock = ManualClock::new();
    let settings = PracticeSettings::new(
        PracticeMode::defaults_for(ModeKind::Sentence),
        Language::English,
    );
    // one word per item; 1s, 0.75s, 0.6s give 60, 80, 100 wpm
    let mut session = SessionOrchestrator::with_queue(
        settings,
        vec!["one".into(), "two".into(), "six".into()],
        clock.clone(),
    );

    for (index, (text, secs)) in [("one", 1.0), ("two", 0.75), ("six", 0.6)]
        .into_iter()
        .enumerate()
    {
        session.handle_input(&text[..1]);
        clock.advance_secs(secs);
        let event = session.handle_input(text);
        if index < 2 {
            assert_eq!(event, SessionEvent::Advanced(index + 1));
        } else {
            let result = assert_matches!(event, SessionEvent::Finished(result) => result);
            assert_eq!(result.stats.wpm, 80);
            assert_eq!(result.stats.accuracy, 100);
            assert_eq!(result.metadata.result_extra.fail_reason, None);
            assert_eq!(result.metadata.submode, ModeKind::Sentence);
        }
    }
}

#[test]
fn kor_drill_session_stays_korean() {
    let mut settings = PracticeSettings::default();
    settings.set_language(Language::English);
    settings.select_mode(ModeKind::KorDrill);
    assert_eq!(settings.language(), Language::Korean);

    let session = SessionOrchestrator::start(settings, &[]);
    assert_eq!(session.total_items(), 5);
    assert!(session
        .current_text()
        .chars()
        .any(|c| ('가'..='힣').contains(&c)));
}
