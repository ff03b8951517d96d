//! Outcome events for output adapters (HUD, audio, scoreboard display)
//!
//! The simulation pushes events onto a queue during `tick`/`launch`; the host
//! either drains them as values or dispatches them to a `GameListener`.

use serde::Serialize;

use super::scoreboard::Frame;
use super::state::PinId;

/// Something an output adapter may want to react to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GameEvent {
    /// Running game total changed
    ScoreChanged { score: u32 },
    /// Throws remaining in the current frame
    ThrowsLeftChanged { throws_left: u8 },
    PinFall { pin: PinId },
    BallRoll,
    Gutter,
    Strike,
    Spare,
    /// A fresh frame was racked
    Reset,
    ScoreboardChanged {
        frames: Vec<Frame>,
        current_index: usize,
        total: u32,
    },
    GameFinished { total: u32 },
}

/// Listener with a no-op default for every event
pub trait GameListener {
    fn on_score_change(&mut self, _score: u32) {}
    fn on_throws_left_change(&mut self, _throws_left: u8) {}
    fn on_pin_fall(&mut self, _pin: PinId) {}
    fn on_ball_roll(&mut self) {}
    fn on_gutter(&mut self) {}
    fn on_strike(&mut self) {}
    fn on_spare(&mut self) {}
    fn on_reset(&mut self) {}
    fn on_scoreboard_change(&mut self, _frames: &[Frame], _current_index: usize, _total: u32) {}
    fn on_game_finished(&mut self, _total: u32) {}
}

/// Route one event to the matching listener method
pub fn dispatch<L: GameListener + ?Sized>(listener: &mut L, event: &GameEvent) {
    match event {
        GameEvent::ScoreChanged { score } => listener.on_score_change(*score),
        GameEvent::ThrowsLeftChanged { throws_left } => listener.on_throws_left_change(*throws_left),
        GameEvent::PinFall { pin } => listener.on_pin_fall(*pin),
        GameEvent::BallRoll => listener.on_ball_roll(),
        GameEvent::Gutter => listener.on_gutter(),
        GameEvent::Strike => listener.on_strike(),
        GameEvent::Spare => listener.on_spare(),
        GameEvent::Reset => listener.on_reset(),
        GameEvent::ScoreboardChanged {
            frames,
            current_index,
            total,
        } => listener.on_scoreboard_change(frames, *current_index, *total),
        GameEvent::GameFinished { total } => listener.on_game_finished(*total),
    }
}

/// FIFO of pending events
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take all pending events, oldest first
    pub fn drain(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Deliver all pending events to a listener, oldest first
    pub fn dispatch_to<L: GameListener + ?Sized>(&mut self, listener: &mut L) {
        for event in self.drain() {
            dispatch(listener, &event);
        }
    }

    pub fn pending(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
