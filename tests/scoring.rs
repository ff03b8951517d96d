//! Scoring properties over randomly played games

use proptest::prelude::*;
use ten_pin::sim::{FRAME_COUNT, FrameScoreboard, ThrowSymbol};

/// Classic ten-pin total from a flat list of throws
fn reference_score(rolls: &[u8]) -> u32 {
    let roll = |i: usize| rolls.get(i).copied().unwrap_or(0) as u32;
    let mut score = 0;
    let mut i = 0;
    for _ in 0..FRAME_COUNT {
        if roll(i) == 10 {
            score += 10 + roll(i + 1) + roll(i + 2);
            i += 1;
        } else if roll(i) + roll(i + 1) == 10 {
            score += 10 + roll(i + 2);
            i += 2;
        } else {
            score += roll(i) + roll(i + 1);
            i += 2;
        }
    }
    score
}

/// Play a whole game, mapping each raw draw onto the pins still standing.
/// Returns the board and a snapshot of every frame's cumulative after each throw.
fn play(raw: &[u8], fouls: &[bool]) -> (FrameScoreboard, Vec<Vec<Option<u32>>>) {
    let mut board = FrameScoreboard::new();
    let mut history = Vec::new();
    for (i, &draw) in raw.iter().enumerate() {
        if board.is_finished() {
            break;
        }
        let outcome = if fouls.get(i).copied().unwrap_or(false) {
            board.record_foul()
        } else {
            let pins = draw % (board.standing_pins() + 1);
            board.record_throw(pins)
        }
        .expect("throw within budget");
        history.push(board.frames().iter().map(|f| f.cumulative).collect());
        if outcome.frame_locked {
            board.advance_frame();
        }
    }
    (board, history)
}

fn board_from(rolls: &[u8]) -> FrameScoreboard {
    let mut board = FrameScoreboard::new();
    for &pins in rolls {
        let outcome = board.record_throw(pins).expect("valid reference roll");
        if outcome.frame_locked {
            board.advance_frame();
        }
    }
    board
}

proptest! {
    /// Property: any legal game finishes within 21 throws and scores by the classic formula
    #[test]
    fn prop_total_matches_reference(raw in prop::collection::vec(any::<u8>(), 21)) {
        let (board, _) = play(&raw, &[]);
        prop_assert!(board.is_finished());
        board.check_consistency().map_err(|e| TestCaseError::fail(e.to_string()))?;

        let rolls: Vec<u8> = board
            .frames()
            .iter()
            .flat_map(|f| f.throws.iter().map(|t| t.pins))
            .collect();
        prop_assert!(rolls.len() <= 21);
        prop_assert_eq!(board.total_score(), reference_score(&rolls));
        prop_assert!(board.total_score() <= 300);
    }

    /// Property: no frame ever exceeds its throw budget
    #[test]
    fn prop_budget_respected(raw in prop::collection::vec(any::<u8>(), 21)) {
        let (board, _) = play(&raw, &[]);
        for frame in board.frames() {
            let budget = if frame.index < FRAME_COUNT - 1 { 2 } else { 3 };
            prop_assert!(frame.throws.len() <= budget);
            if frame.index < FRAME_COUNT - 1 && frame.is_strike() {
                prop_assert_eq!(frame.throws.len(), 1);
            }
        }
        let tenth = &board.frames()[FRAME_COUNT - 1];
        let bonus = tenth.is_strike() || tenth.is_spare();
        prop_assert_eq!(tenth.throws.len(), if bonus { 3 } else { 2 });
    }

    /// Property: cumulative values never decrease and never change once resolved
    #[test]
    fn prop_cumulative_monotone_and_fixed(
        raw in prop::collection::vec(any::<u8>(), 21),
        fouls in prop::collection::vec(prop::bool::weighted(0.1), 21),
    ) {
        let (board, history) = play(&raw, &fouls);
        board.check_consistency().map_err(|e| TestCaseError::fail(e.to_string()))?;

        for pair in history.windows(2) {
            for (before, after) in pair[0].iter().zip(&pair[1]) {
                if before.is_some() {
                    prop_assert_eq!(before, after);
                }
            }
        }
        let resolved: Vec<u32> = board.frames().iter().filter_map(|f| f.cumulative).collect();
        prop_assert!(resolved.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(resolved.len(), FRAME_COUNT);
    }

    /// Property: a strike mark appears exactly when all ten fall to the first ball of a rack
    #[test]
    fn prop_strike_marks(raw in prop::collection::vec(any::<u8>(), 21)) {
        let (board, _) = play(&raw, &[]);
        for frame in board.frames().iter().take(FRAME_COUNT - 1) {
            let first = frame.throws[0];
            prop_assert_eq!(first.symbol == ThrowSymbol::Strike, first.pins == 10);
        }
    }
}

#[test]
fn test_reference_games() {
    let gutter = board_from(&[0; 20]);
    assert_eq!(gutter.total_score(), 0);

    let perfect = board_from(&[10; 12]);
    assert_eq!(perfect.total_score(), 300);

    let mut spares = Vec::new();
    for _ in 0..10 {
        spares.extend([9, 1]);
    }
    spares.push(9);
    assert_eq!(board_from(&spares).total_score(), 190);
}

#[test]
fn test_mixed_game() {
    // X 7/ 9- X -8 8/ -6 X X X81
    let rolls = [10, 7, 3, 9, 0, 10, 0, 8, 8, 2, 0, 6, 10, 10, 10, 8, 1];
    let board = board_from(&rolls);
    assert!(board.is_finished());
    assert_eq!(board.total_score(), 167);
    let marks: Vec<String> = board.frames().iter().map(|f| f.marks()).collect();
    assert_eq!(
        marks,
        vec!["X", "7/", "9-", "X", "-8", "8/", "-6", "X", "X", "X81"]
    );
}
