//! Headless demo: plays one full game on the built-in lane world
//!
//! Usage: `ten-pin [settings.json]`. Set `RUST_LOG=debug` to follow every throw.

#[cfg(not(target_arch = "wasm32"))]
use glam::Vec3;
#[cfg(not(target_arch = "wasm32"))]
use ten_pin::sim::{Frame, GameController, GameListener, GamePhase, LaneWorld, PinId};
#[cfg(not(target_arch = "wasm32"))]
use ten_pin::{ConfigError, Settings};

/// Display refresh rate driving the simulation
#[cfg(not(target_arch = "wasm32"))]
const DISPLAY_DT: f32 = 1.0 / 60.0;
/// Give up after this much simulated time
#[cfg(not(target_arch = "wasm32"))]
const MAX_GAME_SECS: f32 = 600.0;

/// Logs game events as they happen
#[cfg(not(target_arch = "wasm32"))]
#[derive(Default)]
struct ConsoleListener {
    pins_this_throw: Vec<PinId>,
}

#[cfg(not(target_arch = "wasm32"))]
impl GameListener for ConsoleListener {
    fn on_ball_roll(&mut self) {
        self.pins_this_throw.clear();
        log::debug!("Ball rolling");
    }

    fn on_pin_fall(&mut self, pin: PinId) {
        self.pins_this_throw.push(pin);
    }

    fn on_gutter(&mut self) {
        log::info!("Gutter ball");
    }

    fn on_strike(&mut self) {
        log::info!("Strike!");
    }

    fn on_spare(&mut self) {
        log::info!("Spare!");
    }

    fn on_scoreboard_change(&mut self, frames: &[Frame], current_index: usize, total: u32) {
        if let Some(frame) = frames.get(current_index) {
            log::info!(
                "Frame {:>2} [{:<3}] pins down {:?}, total {}",
                current_index + 1,
                frame.marks(),
                self.pins_this_throw,
                total
            );
        }
    }

    fn on_game_finished(&mut self, total: u32) {
        log::info!("Game over: {total}");
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn print_scoresheet(frames: &[Frame]) {
    let marks: Vec<String> = frames.iter().map(|f| format!("{:^5}", f.marks())).collect();
    let totals: Vec<String> = frames
        .iter()
        .map(|f| match f.cumulative {
            Some(total) => format!("{total:^5}"),
            None => format!("{:^5}", ""),
        })
        .collect();
    println!("|{}|", marks.join("|"));
    println!("|{}|", totals.join("|"));
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), ConfigError> {
    env_logger::init();
    log::info!("Ten Pin (headless) starting...");

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let mut game = GameController::new(LaneWorld::new(), &settings);
    let mut listener = ConsoleListener::default();
    // Small alternating aim offsets so throws differ
    let aims = [0.0, 0.012, -0.01, 0.02];
    let mut throws = 0usize;
    let mut elapsed = 0.0;

    while game.phase() != GamePhase::Finished && elapsed < MAX_GAME_SECS {
        if game.phase() == GamePhase::AwaitingThrow {
            let aim = aims[throws % aims.len()];
            if game.launch(Vec3::new(aim, 0.0, -1.0), 10.0) {
                throws += 1;
            }
        }
        game.tick(DISPLAY_DT);
        game.dispatch_events(&mut listener);
        elapsed += DISPLAY_DT;
    }

    if game.phase() != GamePhase::Finished {
        log::warn!("Stopped after {MAX_GAME_SECS}s of simulated time");
    }
    print_scoresheet(game.scoreboard().frames());
    println!("Total: {} ({throws} throws)", game.total_score());
    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Headless demo is native only
}
