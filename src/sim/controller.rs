//! Game flow
//!
//! `GameController` owns the physics world, the throw engine and the
//! scoreboard, and sequences them: rack a frame, accept a launch, record the
//! throw when it ends, respawn the ball or pause and advance to the next frame.
//!
//! The pause after a locked frame is a countdown driven by `tick`. Each
//! scheduled advance carries the generation it was scheduled in; a manual reset
//! or new game bumps the generation so an advance already counting down is
//! dropped when it fires instead of racking twice.

use glam::Vec3;
use log::{debug, error, info, trace, warn};

use super::catalog::{BallPreset, get_ball_preset};
use super::events::{EventQueue, GameEvent, GameListener};
use super::physics::{BodyDesc, BodyHandle, ContactParams, MaterialKind, PhysicsAdapter, Pose, Shape};
use super::scoreboard::{FrameScoreboard, RecordOutcome};
use super::state::GamePhase;
use super::throw::{EndReason, ThrowEnd, ThrowEngine};
use crate::consts::*;
use crate::error::{ConfigError, InvariantViolation};
use crate::playable_half_width;
use crate::settings::{Difficulty, DifficultyProfile, Settings};

/// Ball against lane restitution (friction comes from the difficulty)
const BALL_LANE_RESTITUTION: f32 = 0.02;
const BALL_PIN_CONTACT: ContactParams = ContactParams {
    friction: 0.08,
    restitution: 0.28,
};
const PIN_PIN_CONTACT: ContactParams = ContactParams {
    friction: 0.15,
    restitution: 0.25,
};

/// Center x of the right gutter rail for a difficulty (the left one mirrors it)
pub fn gutter_rail_x(profile: &DifficultyProfile) -> f32 {
    playable_half_width(profile.gutter_width_fraction)
        + GUTTER_CHANNEL_WIDTH
        + GUTTER_RAIL_HALF_THICKNESS
}

/// Static lane bodies
#[derive(Debug, Clone, Copy)]
struct LaneColliders {
    floor: BodyHandle,
    left_rail: BodyHandle,
    right_rail: BodyHandle,
}

#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    generation: u64,
    remaining: f32,
}

pub struct GameController<P: PhysicsAdapter> {
    physics: P,
    difficulty: Difficulty,
    ball: &'static BallPreset,
    auto_advance_secs: f32,
    engine: ThrowEngine,
    scoreboard: FrameScoreboard,
    events: EventQueue,
    phase: GamePhase,
    lane: Option<LaneColliders>,
    generation: u64,
    pending: Option<PendingAdvance>,
}

impl<P: PhysicsAdapter> GameController<P> {
    /// Build a controller around `physics` and rack frame 1
    pub fn new(physics: P, settings: &Settings) -> Self {
        let ball = get_ball_preset(Some(&settings.ball));
        if ball.id != settings.ball {
            warn!("Unknown ball '{}', using {}", settings.ball, ball.id);
        }
        let mut controller = Self {
            physics,
            difficulty: settings.difficulty,
            ball,
            auto_advance_secs: settings.auto_advance_secs.max(0.0),
            engine: ThrowEngine::new(
                settings.difficulty.profile(),
                settings.fall_criterion,
                settings.seed,
            ),
            scoreboard: FrameScoreboard::new(),
            events: EventQueue::new(),
            phase: GamePhase::AwaitingThrow,
            lane: None,
            generation: 0,
            pending: None,
        };
        info!(
            "New game: difficulty {}, ball {}, seed {:#x}",
            controller.difficulty, controller.ball.id, settings.seed
        );
        controller.start_frame();
        controller
    }

    /// Reset the world and rack the current frame
    pub fn start_frame(&mut self) {
        self.physics.reset();
        self.engine.clear();
        self.configure_contacts();
        self.place_lane();
        self.engine.spawn_rack(&mut self.physics);
        self.engine.spawn_ball(&mut self.physics, self.ball);
        self.engine.arm();
        self.phase = GamePhase::AwaitingThrow;

        info!("Frame {} ready", self.scoreboard.current_index() + 1);
        self.events.emit(GameEvent::Reset);
        self.emit_score_state();
    }

    fn configure_contacts(&mut self) {
        let profile = self.engine.profile();
        self.physics.set_contact_material(
            MaterialKind::Ball,
            MaterialKind::Lane,
            ContactParams {
                friction: profile.lane_friction,
                restitution: BALL_LANE_RESTITUTION,
            },
        );
        self.physics
            .set_contact_material(MaterialKind::Ball, MaterialKind::Pin, BALL_PIN_CONTACT);
        self.physics
            .set_contact_material(MaterialKind::Pin, MaterialKind::Pin, PIN_PIN_CONTACT);
    }

    fn place_lane(&mut self) {
        // Floor runs from the approach behind the foul line to the end of the deck
        let floor_half_length = (LANE_LENGTH + APPROACH_LENGTH) * 0.5;
        let floor = self.physics.create_body(
            &BodyDesc::fixed(Shape::Cuboid {
                half_extents: Vec3::new(LANE_HALF_WIDTH, LANE_HALF_THICKNESS, floor_half_length),
            })
            .with_material(MaterialKind::Lane)
            .with_position(Vec3::new(
                0.0,
                -LANE_HALF_THICKNESS,
                APPROACH_LENGTH - floor_half_length,
            )),
        );

        let half_length = LANE_LENGTH * 0.5;

        let rail = BodyDesc::fixed(Shape::Cuboid {
            half_extents: Vec3::new(GUTTER_RAIL_HALF_THICKNESS, GUTTER_RAIL_HALF_HEIGHT, half_length),
        })
        .with_material(MaterialKind::Rail);
        let x = gutter_rail_x(self.engine.profile());
        let left_rail = self
            .physics
            .create_body(&rail.clone().with_position(rail_position(-x)));
        let right_rail = self.physics.create_body(&rail.with_position(rail_position(x)));

        self.lane = Some(LaneColliders {
            floor,
            left_rail,
            right_rail,
        });
    }

    /// Switch difficulty mid-game. Rails move and lane friction changes
    /// immediately; the frame in progress is kept.
    pub fn apply_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
        self.engine.set_profile(difficulty.profile());
        self.configure_contacts();

        if let Some(lane) = self.lane {
            let x = gutter_rail_x(self.engine.profile());
            for (handle, x) in [(lane.left_rail, -x), (lane.right_rail, x)] {
                self.physics.set_pose(handle, Pose::at(rail_position(x)));
                self.physics.set_linear_velocity(handle, Vec3::ZERO);
            }
            trace!("Lane floor {:?}, rails at x = ±{x:.3}", lane.floor);
        }
        info!("Difficulty set to {difficulty}");
    }

    /// Switch difficulty by name, rejecting unknown names
    pub fn apply_difficulty_named(&mut self, name: &str) -> Result<(), ConfigError> {
        let difficulty = name.parse::<Difficulty>()?;
        self.apply_difficulty(difficulty);
        Ok(())
    }

    /// Change the ball preset. A ball waiting on the approach is swapped now,
    /// otherwise the preset applies from the next spawn.
    pub fn select_ball(&mut self, id: &str) -> &'static BallPreset {
        self.ball = get_ball_preset(Some(id));
        if self.phase == GamePhase::AwaitingThrow && self.engine.is_armed() {
            self.engine.spawn_ball(&mut self.physics, self.ball);
            self.engine.arm();
        }
        info!("Ball set to {}", self.ball.id);
        self.ball
    }

    fn can_launch(&self) -> bool {
        self.phase == GamePhase::AwaitingThrow
            && self.scoreboard.throws_left() > 0
            && !self.scoreboard.is_finished()
    }

    /// Throw with an aim direction and power. Ignored (false) unless a ball
    /// is waiting and the frame has throws left.
    pub fn launch(&mut self, direction: Vec3, power: f32) -> bool {
        if !self.can_launch() || !self.engine.launch(&mut self.physics, direction, power) {
            return false;
        }
        self.on_release();
        true
    }

    /// Throw with a captured release velocity. Same rules as `launch`.
    pub fn launch_with_velocity(&mut self, velocity: Vec3) -> bool {
        if !self.can_launch() || !self.engine.launch_with_velocity(&mut self.physics, velocity) {
            return false;
        }
        self.on_release();
        true
    }

    fn on_release(&mut self) {
        self.phase = GamePhase::Rolling;
        self.events.emit(GameEvent::BallRoll);
    }

    /// Advance the game by a display-frame delta
    pub fn tick(&mut self, dt: f32) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        if let Some(end) = self.engine.tick(&mut self.physics, dt, &mut self.events) {
            self.finish_throw(end);
        }
        self.run_timer(dt);
    }

    /// Report a foul on the ball in flight. False if nothing is rolling.
    pub fn declare_foul(&mut self) -> bool {
        if self.phase != GamePhase::Rolling {
            return false;
        }
        match self.engine.declare_foul() {
            Some(end) => {
                self.finish_throw(end);
                true
            }
            None => false,
        }
    }

    fn finish_throw(&mut self, end: ThrowEnd) {
        let knocked = self.engine.take_knockdown();
        let recorded = if end.reason == EndReason::Foul {
            // A foul credits nothing and the rack goes back to ten standing
            if knocked > 0 {
                debug!("Foul: respotting {knocked} pins");
            }
            self.engine.spawn_rack(&mut self.physics);
            self.scoreboard.record_foul()
        } else {
            self.scoreboard.record_throw(knocked)
        };

        match recorded {
            Ok(outcome) => self.on_recorded(outcome, end),
            Err(violation) => {
                self.report_violation(&violation);
                // Keep the game playable: fall back to the next rack state
                if self.scoreboard.current_frame().is_locked() {
                    self.pause_for_advance();
                } else {
                    self.respawn_for_next_throw();
                }
            }
        }
        if let Err(violation) = self.scoreboard.check_consistency() {
            self.report_violation(&violation);
        }
    }

    fn on_recorded(&mut self, outcome: RecordOutcome, end: ThrowEnd) {
        debug!(
            "Frame {} throw {}: {} ({:?}), total {}",
            outcome.frame_index + 1,
            outcome.throw_index + 1,
            outcome.throw.symbol,
            end.reason,
            outcome.total
        );
        if outcome.is_strike() {
            self.events.emit(GameEvent::Strike);
        } else if outcome.is_spare() {
            self.events.emit(GameEvent::Spare);
        }
        self.emit_score_state();

        if outcome.frame_locked {
            self.pause_for_advance();
        } else {
            self.respawn_for_next_throw();
        }
    }

    fn respawn_for_next_throw(&mut self) {
        if self.scoreboard.needs_fresh_rack() {
            self.engine.spawn_rack(&mut self.physics);
        }
        self.engine.spawn_ball(&mut self.physics, self.ball);
        self.engine.arm();
        self.phase = GamePhase::AwaitingThrow;
    }

    fn pause_for_advance(&mut self) {
        self.engine.disarm();
        self.phase = GamePhase::FrameComplete;
        self.pending = Some(PendingAdvance {
            generation: self.generation,
            remaining: self.auto_advance_secs,
        });
        debug!("Next frame in {:.1}s", self.auto_advance_secs);
    }

    fn run_timer(&mut self, dt: f32) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        pending.remaining -= dt;
        if pending.remaining > 0.0 {
            return;
        }
        let fired = *pending;
        self.pending = None;
        if fired.generation != self.generation {
            trace!("Dropped stale frame advance (generation {})", fired.generation);
            return;
        }
        self.advance();
    }

    /// Leave a locked frame: rack the next one or finish the game
    fn advance(&mut self) {
        if self.scoreboard.is_finished() {
            if self.phase != GamePhase::Finished {
                self.phase = GamePhase::Finished;
                let total = self.scoreboard.total_score();
                info!("Game finished: {total}");
                self.events.emit(GameEvent::GameFinished { total });
            }
            return;
        }
        if self.scoreboard.advance_frame() {
            self.start_frame();
        }
    }

    fn cancel_pending(&mut self) {
        self.generation += 1;
    }

    /// Manual reset. An open frame loses its throws and is re-racked; a
    /// locked frame advances right away instead of waiting out the pause.
    pub fn reset_frame(&mut self) {
        if self.phase == GamePhase::Finished {
            return;
        }
        self.cancel_pending();
        if self.scoreboard.current_frame().is_locked() {
            self.advance();
        } else {
            self.scoreboard.reset_current_frame();
            self.start_frame();
        }
    }

    /// Clear the scoreboard and start over at frame 1. Events still queued
    /// from the old game are discarded.
    pub fn new_game(&mut self) {
        self.cancel_pending();
        self.events.clear();
        self.scoreboard = FrameScoreboard::new();
        info!("New game");
        self.start_frame();
    }

    fn emit_score_state(&mut self) {
        let total = self.scoreboard.total_score();
        self.events.emit(GameEvent::ScoreChanged { score: total });
        self.events.emit(GameEvent::ThrowsLeftChanged {
            throws_left: self.scoreboard.throws_left() as u8,
        });
        self.events.emit(GameEvent::ScoreboardChanged {
            frames: self.scoreboard.frames().to_vec(),
            current_index: self.scoreboard.current_index(),
            total,
        });
    }

    fn report_violation(&self, violation: &InvariantViolation) {
        match violation.frame() {
            Some(frame) if frame != self.scoreboard.current_index() => error!(
                "Scoreboard invariant violated on frame {} (current {}): {violation}",
                frame + 1,
                self.scoreboard.current_index() + 1
            ),
            _ => error!("Scoreboard invariant violated: {violation}"),
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn scoreboard(&self) -> &FrameScoreboard {
        &self.scoreboard
    }

    pub fn engine(&self) -> &ThrowEngine {
        &self.engine
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn ball_preset(&self) -> &'static BallPreset {
        self.ball
    }

    pub fn total_score(&self) -> u32 {
        self.scoreboard.total_score()
    }

    /// Seconds left before the pending frame advance, if one is live
    pub fn pending_advance(&self) -> Option<f32> {
        self.pending
            .filter(|p| p.generation == self.generation)
            .map(|p| p.remaining.max(0.0))
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain()
    }

    pub fn dispatch_events<L: GameListener + ?Sized>(&mut self, listener: &mut L) {
        self.events.dispatch_to(listener);
    }
}

fn rail_position(x: f32) -> Vec3 {
    Vec3::new(x, GUTTER_RAIL_HALF_HEIGHT, -LANE_LENGTH * 0.5)
}
