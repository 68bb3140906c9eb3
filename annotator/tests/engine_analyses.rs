//! Evaluation-backed analyses driven by a scripted evaluator.

use annotator::{Annotator, AnnotatorConfig, GameReport, OpeningCatalog, Timeline};
use chess::{AnalysisScore, Position};
use engine::mock::ScriptedEvaluator;

fn config(zwischenzug: bool, zugzwang: bool) -> AnnotatorConfig {
    AnnotatorConfig {
        enable_zwischenzug: zwischenzug,
        enable_zugzwang: zugzwang,
        ..AnnotatorConfig::default()
    }
}

fn run(
    config: AnnotatorConfig,
    fen: &str,
    moves: &[&str],
    result: &str,
    engine: &mut ScriptedEvaluator,
) -> GameReport {
    let timeline = Timeline::replay_san(Position::from_fen(fen).unwrap(), moves).unwrap();
    Annotator::new(config, OpeningCatalog::new()).annotate(&timeline, result, Some(engine))
}

fn play(position: &Position, san: &str) -> Position {
    position.play(position.parse_san(san).unwrap()).unwrap()
}

#[test]
fn intermediate_reply_is_flagged() {
    let fen = "7k/8/8/8/8/8/6n1/R5K1 w - - 0 1";
    let after = play(&Position::from_fen(fen).unwrap(), "Ra2");
    let swung = play(&after, "Ne3");

    // White is +500 after Ra2 and every reply except ...Ne3, which drops it to +300.
    let mut engine = ScriptedEvaluator::new()
        .with_default(AnalysisScore::Centipawns(500))
        .with_score(after.fen(), AnalysisScore::Centipawns(-500));
    engine.set_score(&swung, AnalysisScore::Centipawns(300));

    let report = run(config(true, false), fen, &["Ra2"], "*", &mut engine);

    let white = &report["zwischenzug"]["white"];
    assert_eq!(white["count"], 1);
    let flagged = &white["details"][0];
    assert_eq!(flagged["san"], "Ra2");
    assert_eq!(flagged["replies"].as_array().unwrap().len(), 1);
    assert_eq!(flagged["replies"][0]["reply"], "Ne3");
    assert_eq!(flagged["replies"][0]["reply_uci"], "g2e3");
    assert_eq!(flagged["replies"][0]["delta_cp"], -200);
    assert_eq!(flagged["types"], serde_json::json!(["threatens_capture"]));

    // The rook now hits the loose knight, and the threat carries the same sample.
    let threats = &report["material_threats"];
    assert_eq!(threats["white"]["count"], 1);
    assert_eq!(threats["white"]["details"][0]["evaluation_cp"], 500);
    assert_eq!(threats["evaluation"]["status"], "available");
}

#[test]
fn king_and_pawn_zugzwang_is_found() {
    let fen = "8/8/8/2kp4/8/3K4/8/8 w - - 0 1";
    let after = play(&Position::from_fen(fen).unwrap(), "Ke3");

    // Black to move holds at 0, but every black move leaves white +200.
    let mut engine = ScriptedEvaluator::new()
        .with_default(AnalysisScore::Centipawns(200))
        .with_score(after.fen(), AnalysisScore::Centipawns(0));

    let report = run(config(false, true), fen, &["Ke3"], "*", &mut engine);

    let black = &report["zugzwang"]["black"];
    assert_eq!(black["count"], 1);
    assert_eq!(black["details"][0]["ply"], 1);
    assert_eq!(black["details"][0]["best_trial_cp"], -200);
    assert_eq!(report["zugzwang"]["white"]["count"], 0);
}

#[test]
fn resignation_in_a_lost_position_is_correct() {
    let mut engine = ScriptedEvaluator::new().with_score(chess::STARTING_FEN, AnalysisScore::Centipawns(400));
    let report = run(config(false, false), chess::STARTING_FEN, &["e4"], "1-0", &mut engine);

    let termination = &report["termination"];
    assert_eq!(termination["winner"], "white");
    assert_eq!(termination["winning_method"], "Resignation");
    assert_eq!(termination["resignation"]["verdict"], "Correct");
    assert_eq!(termination["resignation"]["score_cp"], 400);
    assert_eq!(engine.calls().len(), 1);
}

#[test]
fn resignation_with_a_forced_mate_in_hand_is_incorrect() {
    let mut engine = ScriptedEvaluator::new().with_score(chess::STARTING_FEN, AnalysisScore::Mate(-4));
    let report = run(config(false, false), chess::STARTING_FEN, &["e4"], "1-0", &mut engine);
    assert_eq!(report["termination"]["resignation"]["verdict"], "Incorrect");
}

#[test]
fn failing_engine_degrades_only_the_evaluation_analyses() {
    let mut engine = ScriptedEvaluator::failing("engine crashed");
    let report = run(
        AnnotatorConfig::default(),
        chess::STARTING_FEN,
        &["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"],
        "1-0",
        &mut engine,
    );

    for key in ["zwischenzug", "zugzwang"] {
        assert_eq!(report[key]["status"], "evaluation unavailable", "{key}");
        let reason = report[key]["reason"].as_str().unwrap();
        assert!(reason.contains("engine crashed"), "{key}: {reason}");
    }

    // Nf3 attacks the undefended e5 pawn; the threat is kept without a score.
    let threats = &report["material_threats"];
    assert_eq!(threats["evaluation"]["status"], "evaluation unavailable");
    assert!(threats["white"]["count"].as_u64().unwrap() >= 1);
    assert!(threats["white"]["details"][0]["evaluation_cp"].is_null());

    assert_eq!(report["summary"]["total_plies"], 6);
    assert_eq!(report["checks"]["white"]["checks"], 0);
    assert_eq!(report["termination"]["resignation"]["verdict"], "Unavailable");
}
