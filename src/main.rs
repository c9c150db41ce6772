/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use domain::data::GameData;
use sim::event::GameEvent;
use sim::level::{Level, Phase};
use sim::step::{self, FrameInput};
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let config = GameConfig::load();

    let seed = config.tuning.seed.unwrap_or_else(rand::random);
    let mut level = Level::new(GameData::standard(), config.tuning.clone(), seed);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut level, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Shift over. Thanks for operating!");
    println!("Tips earned: {}", level.score);
}

// ── Key Constants ──

const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_QUIT: &[KeyCode] = &[KeyCode::Char('q'), KeyCode::Char('Q')];
const KEYS_PAUSE: &[KeyCode] = &[KeyCode::F(1), KeyCode::Char('p'), KeyCode::Char('P')];

fn game_loop(
    level: &mut Level,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.tuning.tick_rate_ms);
    let dt = config.tuning.tick_rate_ms as f32 / 1000.0;
    let mut paused = false;

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() {
            break;
        }
        if handle_meta(level, &kb, &mut paused) {
            break;
        }

        if last_tick.elapsed() >= tick_rate {
            if !paused {
                let input = FrameInput {
                    up: kb.any_held(KEYS_UP),
                    down: kb.any_held(KEYS_DOWN),
                };
                let events = step::step(level, input, dt);
                process_sound_events(sound, &events);
                renderer.note_events(level, &events);
            }
            last_tick = Instant::now();
        }

        renderer.render(level)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Returns true when the game should quit.
fn handle_meta(level: &mut Level, kb: &InputState, paused: &mut bool) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM);
    let esc = kb.any_pressed(&[KeyCode::Esc]);

    match level.phase {
        Phase::Title => {
            if confirm {
                level.restart();
            } else if kb.any_pressed(KEYS_QUIT) || esc {
                return true;
            }
        }
        Phase::Playing => {
            if kb.any_pressed(KEYS_PAUSE) {
                *paused = !*paused;
                if *paused {
                    level.set_message("PAUSED  [F1] Resume", 0.0);
                } else {
                    level.set_message("", 0.0);
                }
                return false;
            }
            if *paused {
                // Everything else is blocked while paused.
                return false;
            }
            if kb.any_pressed(KEYS_RESTART) {
                level.restart();
                level.set_message("Shift restarted", 2.0);
            } else if esc {
                level.phase = Phase::Title;
            }
        }
        Phase::Failed => {
            if confirm || kb.any_pressed(KEYS_RESTART) {
                level.restart();
            } else if esc || kb.any_pressed(KEYS_QUIT) {
                return true;
            }
        }
    }

    false
}

fn process_sound_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let sfx = match sound {
        Some(s) => s,
        None => return,
    };
    for event in events {
        match event {
            GameEvent::TipAwarded { combo, .. } => sfx.play_tip(*combo),
            GameEvent::ComboBroken { .. } => sfx.play_combo_break(),
            GameEvent::DoorsOpened { .. } => sfx.play_door(),
            GameEvent::CharacterBoarded { .. } => sfx.play_board(),
            GameEvent::ScareStarted => sfx.play_scare(),
            GameEvent::GhostVanished => sfx.play_vanish(),
            GameEvent::RenovationStarted { .. } => sfx.play_renovate(),
            GameEvent::FloorOverflowed { .. } => sfx.play_overflow(),
            _ => {}
        }
    }
}
