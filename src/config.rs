/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tuning: Tuning,
}

/// Simulation tuning. The Level carries a copy, so the whole game can be
/// re-parameterized from config.toml without touching code.
#[derive(Clone, Debug)]
pub struct Tuning {
    pub tick_rate_ms: u64,
    pub num_floors: usize,
    /// Floors per second at full throttle, before load slowdown.
    pub elevator_move_speed: f32,
    /// Seconds for a full door open/close cycle.
    pub elevator_door_open_time: f32,
    /// Total character width the car holds.
    pub max_width_capacity: f32,
    /// Total queued character width a floor holds before it overflows.
    pub floor_capacity: f32,
    /// World units per second for a character's base gait.
    pub walk_speed: f32,
    /// Starting spawn interval; shrinks as play time accumulates.
    pub spawn_base_interval: f32,
    pub floor_appear_time: f32,
    pub floor_renovate_time: f32,
    /// Fixed RNG seed for reproducible sessions; None draws from entropy.
    pub seed: Option<u64>,
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning {
            tick_rate_ms: default_tick_rate(),
            num_floors: default_num_floors(),
            elevator_move_speed: default_move_speed(),
            elevator_door_open_time: default_door_open_time(),
            max_width_capacity: default_width_capacity(),
            floor_capacity: default_floor_capacity(),
            walk_speed: default_walk_speed(),
            spawn_base_interval: default_spawn_interval(),
            floor_appear_time: default_appear_time(),
            floor_renovate_time: default_renovate_time(),
            seed: None,
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    tuning: TomlTuning,
}

#[derive(Deserialize, Debug)]
struct TomlTuning {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_num_floors")]
    num_floors: usize,
    #[serde(default = "default_move_speed")]
    elevator_move_speed: f32,
    #[serde(default = "default_door_open_time")]
    elevator_door_open_time: f32,
    #[serde(default = "default_width_capacity")]
    max_width_capacity: f32,
    #[serde(default = "default_floor_capacity")]
    floor_capacity: f32,
    #[serde(default = "default_walk_speed")]
    walk_speed: f32,
    #[serde(default = "default_spawn_interval")]
    spawn_base_interval: f32,
    #[serde(default = "default_appear_time")]
    floor_appear_time: f32,
    #[serde(default = "default_renovate_time")]
    floor_renovate_time: f32,
    #[serde(default)]
    seed: Option<u64>,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 33 }     // ~30 fps
fn default_num_floors() -> usize { 6 }
fn default_move_speed() -> f32 { 2.0 }
fn default_door_open_time() -> f32 { 1.0 }
fn default_width_capacity() -> f32 { 6.0 }   // three regular customers
fn default_floor_capacity() -> f32 { 18.0 }
fn default_walk_speed() -> f32 { 4.0 }
fn default_spawn_interval() -> f32 { 6.0 }
fn default_appear_time() -> f32 { 1.5 }
fn default_renovate_time() -> f32 { 4.0 }

impl Default for TomlTuning {
    fn default() -> Self {
        TomlTuning {
            tick_rate_ms: default_tick_rate(),
            num_floors: default_num_floors(),
            elevator_move_speed: default_move_speed(),
            elevator_door_open_time: default_door_open_time(),
            max_width_capacity: default_width_capacity(),
            floor_capacity: default_floor_capacity(),
            walk_speed: default_walk_speed(),
            spawn_base_interval: default_spawn_interval(),
            floor_appear_time: default_appear_time(),
            floor_renovate_time: default_renovate_time(),
            seed: None,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        let t = toml_cfg.tuning;

        GameConfig {
            tuning: Tuning {
                tick_rate_ms: t.tick_rate_ms.max(1),
                num_floors: t.num_floors.clamp(2, 8),
                elevator_move_speed: t.elevator_move_speed,
                elevator_door_open_time: t.elevator_door_open_time,
                max_width_capacity: t.max_width_capacity,
                floor_capacity: t.floor_capacity,
                walk_speed: t.walk_speed,
                spawn_base_interval: t.spawn_base_interval,
                floor_appear_time: t.floor_appear_time,
                floor_renovate_time: t.floor_renovate_time,
                seed: t.seed,
            },
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so a packaged binary still finds its config.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/upshaft)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/upshaft");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.tuning.tick_rate_ms, 33);
        assert_eq!(cfg.tuning.num_floors, 6);
        assert_eq!(cfg.tuning.seed, None);
    }

    #[test]
    fn partial_section_keeps_the_rest() {
        let cfg: TomlConfig = toml::from_str(
            "[tuning]\nnum_floors = 4\nseed = 7\n",
        )
        .unwrap();
        assert_eq!(cfg.tuning.num_floors, 4);
        assert_eq!(cfg.tuning.seed, Some(7));
        assert_eq!(cfg.tuning.elevator_move_speed, 2.0);
    }

    #[test]
    fn tuning_default_matches_toml_defaults() {
        let t = Tuning::default();
        assert_eq!(t.tick_rate_ms, 33);
        assert_eq!(t.max_width_capacity, 6.0);
        assert_eq!(t.floor_capacity, 18.0);
        assert_eq!(t.floor_renovate_time, 4.0);
    }
}
