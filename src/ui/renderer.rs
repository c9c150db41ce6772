/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The scene is a side view of the tower: floors stacked bottom-up on
/// the left, the elevator shaft on the right. One world unit maps to
/// two terminal columns; each floor is four rows tall.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::character::{Character, CharacterState};
use crate::domain::data::Variant;
use crate::domain::floor::FloorState;
use crate::sim::event::GameEvent;
use crate::sim::level::{Level, Phase};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, used for
    /// both Clear and cell backgrounds so inter-row gap pixels match.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 18, b: 28 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Cell { ch, fg, bg: Self::norm_bg(bg) }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell::new(ch, fg, bg));
            cx += 1;
        }
    }

    fn fill_row(&mut self, y: usize, fg: Color, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', fg, bg));
        }
    }
}

// ── Layout ──

/// Terminal columns per world unit.
const CELL_W: usize = 2;
/// Terminal rows per floor.
const FLOOR_H: usize = 4;

const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

/// Column of the door threshold (floor/shaft boundary): x = 23, two
/// columns per unit.
const DOOR_COL: usize = 46;

fn col_of(x: f32) -> i32 {
    (x * CELL_W as f32).round() as i32
}

// ── Coin particles ──

const PARTICLE_LIFE: u8 = 24;

struct Particle {
    col: i32,
    row: f32,
    age: u8,
}

// ── Renderer ──

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    anim_tick: u32,
    particles: Vec<Particle>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            anim_tick: 0,
            particles: Vec::new(),
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Spawn visual effects for this frame's simulation events.
    pub fn note_events(&mut self, level: &Level, events: &[GameEvent]) {
        for event in events {
            if let GameEvent::TipAwarded { floor, amount, .. } = event {
                let top = top_row(level, *floor as f32);
                let coins = (*amount).min(8) as i32;
                for i in 0..coins {
                    self.particles.push(Particle {
                        col: DOOR_COL as i32 - 4 - i * 2,
                        row: (top + 2) as f32,
                        age: 0,
                    });
                }
            }
        }
    }

    pub fn render(&mut self, level: &Level) -> io::Result<()> {
        self.anim_tick = self.anim_tick.wrapping_add(1);

        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Phase change → clear for a clean transition
        if self.last_phase != Some(level.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(level.phase);
            self.particles.clear();
        }

        self.front.clear();

        match level.phase {
            Phase::Title => self.compose_title(),
            Phase::Playing | Phase::Failed => {
                self.compose_game(level);
                self.compose_particles();
                if level.phase == Phase::Failed {
                    self.compose_failed_overlay(level);
                }
            }
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors at frame start. Not ResetColor: the
        // terminal's native default may differ from BASE_BG and cause
        // line artifacts.
        queue!(
            self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                let mut s = [0u8; 4];
                queue!(self.writer, Print(cell.ch.encode_utf8(&mut s) as &str))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: the tower ──

    fn compose_game(&mut self, level: &Level) {
        let num_floors = level.tuning.num_floors;
        let depth_cols = (level.elevator_depth() as usize) * CELL_W;

        // ── HUD ──
        let hud_bg = Color::Rgb { r: 25, g: 25, b: 55 };
        self.front.fill_row(HUD_ROW, Color::White, hud_bg);
        let combo = if level.combo_count > 1 {
            format!("  COMBO x{}", level.combo_count)
        } else {
            String::new()
        };
        let hud = format!(
            " Tips:{:<8} Shift:{:>4}s{}",
            level.score,
            level.time as u32,
            combo,
        );
        self.front.put_str(0, HUD_ROW, &hud, Color::White, hud_bg);

        // ── Floors, bottom-up ──
        for floor in &level.floors {
            self.compose_floor(level, floor.number);
        }

        // ── Shaft and car ──
        self.compose_shaft(level, num_floors, depth_cols);

        // ── Characters ──
        for c in &level.characters {
            self.compose_character(level, c);
        }

        // ── Message bar ──
        let msg_row = MAP_ROW + num_floors * FLOOR_H + 1;
        if !level.message.is_empty() && msg_row < self.front.height {
            let bg = Color::Rgb { r: 200, g: 180, b: 50 };
            self.front.fill_row(msg_row, Color::Black, bg);
            let msg = format!(" ◈ {} ", level.message);
            self.front.put_str(0, msg_row, &msg, Color::Black, bg);
        }

        // ── Help bar ──
        let help_row = msg_row + 2;
        if help_row < self.front.height {
            let help = " ↑/W:Up  ↓/S:Down  R:Restart  ESC:Quit ";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_floor(&mut self, level: &Level, number: usize) {
        let floor = &level.floors[number];
        let template = level.data.floor_template(floor.template);
        let top = top_row(level, number as f32);
        let base = top + FLOOR_H - 1;

        let wall_fg = Color::Rgb { r: 110, g: 95, b: 70 };
        let dim = Color::DarkGrey;

        // Ceiling with the floor's name plate
        for col in 0..DOOR_COL {
            self.front.set(col, top, Cell::new('─', wall_fg, Color::Reset));
        }
        let plate = match floor.state {
            FloorState::Appearing => format!("┤ {} ├", render_partial(template.name, floor.state_time / level.tuning.floor_appear_time)),
            FloorState::Renovating | FloorState::Renovated => "┤ UNDER RENOVATION ├".to_string(),
            FloorState::Idle => format!("┤ {} ├", template.name),
        };
        self.front.put_str(2, top, &plate, Color::Rgb { r: 210, g: 190, b: 120 }, Color::Reset);

        // Overflow alarm on the right end of the name row
        if floor.alarm > 0.0 {
            let blink = (self.anim_tick / 4) % 2 == 0;
            let fg = if floor.alarm >= 1.0 || blink {
                Color::Rgb { r: 255, g: 60, b: 60 }
            } else {
                Color::Rgb { r: 140, g: 60, b: 60 }
            };
            self.front.put_str(DOOR_COL - 8, top, "▲FULL▲", fg, Color::Reset);
        }

        // Interior
        match floor.state {
            FloorState::Renovating | FloorState::Renovated => {
                for row in top + 1..base {
                    for col in (0..DOOR_COL).step_by(2) {
                        self.front.set(col, row, Cell::new('╱', dim, Color::Reset));
                    }
                }
            }
            _ => {}
        }

        // Floor line
        for col in 0..DOOR_COL {
            self.front.set(col, base, Cell::new('═', wall_fg, Color::Reset));
        }

        // Landing door at the threshold column
        self.compose_door(DOOR_COL, top, floor.door_visual);
    }

    /// Door visual: 1.0 fully closed, 0.0 fully open.
    fn compose_door(&mut self, col: usize, top: usize, visual: f32) {
        let fg = Color::Rgb { r: 150, g: 150, b: 170 };
        let ch = if visual > 0.75 {
            '█'
        } else if visual > 0.4 {
            '▓'
        } else if visual > 0.1 {
            '░'
        } else {
            ' '
        };
        for row in top + 1..top + FLOOR_H - 1 {
            self.front.set(col, row, Cell::new(ch, fg, Color::Reset));
        }
    }

    fn compose_shaft(&mut self, level: &Level, num_floors: usize, depth_cols: usize) {
        let shaft_fg = Color::Rgb { r: 70, g: 70, b: 90 };
        let shaft_top = MAP_ROW;
        let shaft_bottom = MAP_ROW + num_floors * FLOOR_H - 1;
        let right_wall = DOOR_COL + 1 + depth_cols;

        // Shaft interior and outer wall
        for row in shaft_top..=shaft_bottom {
            for col in DOOR_COL + 1..right_wall {
                self.front.set(col, row, Cell::new('·', Color::Rgb { r: 35, g: 35, b: 48 }, Color::Reset));
            }
            self.front.set(right_wall, row, Cell::new('║', shaft_fg, Color::Reset));
        }

        // Car: three rows tall at its continuous position
        let ev = &level.elevator;
        let car_top = top_row(level, ev.floor_number);
        let car_fg = if ev.reverse_controls {
            Color::Rgb { r: 230, g: 120, b: 230 }
        } else {
            Color::Rgb { r: 220, g: 200, b: 90 }
        };
        for col in DOOR_COL + 1..right_wall {
            self.front.set(col, car_top, Cell::new('▀', car_fg, Color::Reset));
            self.front.set(col, car_top + FLOOR_H - 1, Cell::new('▄', car_fg, Color::Reset));
        }
        for row in car_top + 1..car_top + FLOOR_H - 1 {
            for col in DOOR_COL + 1..right_wall {
                self.front.set(col, row, Cell::new(' ', Color::White, Color::Rgb { r: 30, g: 30, b: 20 }));
            }
        }

        // Car-side door in the same column as the landing doors
        self.compose_door(DOOR_COL, car_top, ev.door_visual);
    }

    fn compose_character(&mut self, level: &Level, c: &Character) {
        if c.dead {
            return;
        }
        // Vertical position: queue row of the settled floor, or inside
        // the car at its continuous height.
        let top = if c.in_elevator {
            top_row(level, level.elevator.floor_number)
        } else {
            top_row(level, c.floor_number.round())
        };
        let head = top + 1;
        let feet = top + 2;

        let (glyph, color) = variant_glyph(c);
        let bg = if c.in_elevator {
            Color::Rgb { r: 30, g: 30, b: 20 }
        } else {
            Cell::BASE_BG
        };

        // A character spans its width: body cells at the feet row, the
        // glyph centered at the head row.
        let half = c.width * 0.5;
        let left = col_of(c.x - half).max(0);
        let right = col_of(c.x + half).max(left + 1);
        let body = if c.variant == Variant::Car { '▬' } else { '▚' };
        for col in left..right {
            self.front.set(col as usize, feet, Cell::new(body, color, bg));
        }
        let mid = col_of(c.x).max(0) as usize;
        self.front.set(mid, head, Cell::new(glyph, color, bg));

        // Scare pose overlay
        if c.scary && c.state == CharacterState::DoingAction {
            self.front.put_str(mid.saturating_sub(1), head.saturating_sub(1), "BOO", Color::White, Color::Reset);
        }
    }

    fn compose_particles(&mut self) {
        self.particles.retain_mut(|p| {
            p.age += 1;
            p.row -= 0.22;
            p.age < PARTICLE_LIFE
        });
        for p in &self.particles {
            if p.col < 0 || p.row < MAP_ROW as f32 {
                continue;
            }
            let fg = if p.age < PARTICLE_LIFE / 2 {
                Color::Rgb { r: 255, g: 220, b: 60 }
            } else {
                Color::Rgb { r: 140, g: 120, b: 40 }
            };
            self.front.set(p.col as usize, p.row as usize, Cell::new('$', fg, Color::Reset));
        }
    }

    // ── Static screens ──

    fn compose_title(&mut self) {
        let title = [
            r"  _   _  ___  ___  _  _   _    ___  _____ ",
            r" | | | || _ \/ __|| || | /_\  | __||_   _|",
            r" | |_| ||  _/\__ \| __ |/ _ \ | _|   | |  ",
            r"  \___/ |_|  |___/|_||_/_/ \_\|_|    |_|  ",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(4, 2 + i, line, Color::Rgb { r: 255, g: 200, b: 50 }, Color::Reset);
        }

        let subtitle = "◈◈  an elevator operator's shift  ◈◈";
        self.front.put_str(8, 7, subtitle, Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);

        let menu_base = 10;
        self.front.put_str(8, menu_base, "ENTER   Start Shift", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        self.front.put_str(8, menu_base + 1, "  Q     Quit", Color::White, Color::Reset);

        let help = [
            "How it works",
            "  Hold ↑/↓ (or W/S) to drive the car.",
            "  Release near a floor and the car snaps in; doors",
            "  open on their own once the car is settled.",
            "  Deliver guests to their floor for tips. Repeat",
            "  deliveries to the same floor build a combo.",
            "  Don't let any floor fill up.",
        ];
        for (i, line) in help.iter().enumerate() {
            let color = if i == 0 {
                Color::Rgb { r: 255, g: 200, b: 50 }
            } else {
                Color::White
            };
            self.front.put_str(8, menu_base + 3 + i, line, color, Color::Reset);
        }
    }

    fn compose_failed_overlay(&mut self, level: &Level) {
        let cy = MAP_ROW + (level.tuning.num_floors * FLOOR_H) / 2;
        let border = "╔══════════════════════════════╗";
        let middle = "║      ✕ SHIFT  OVER ✕         ║";
        let score = format!("║  Tips earned: {:<14} ║", level.score);
        let prompt = "║  ENTER: New shift  ESC: Quit ║";
        let bottom = "╚══════════════════════════════╝";
        let cx = (self.front.width.saturating_sub(border.chars().count())) / 2;
        let fg = Color::Rgb { r: 255, g: 80, b: 80 };
        let bg = Color::Rgb { r: 40, g: 12, b: 12 };
        self.front.put_str(cx, cy - 2, border, fg, bg);
        self.front.put_str(cx, cy - 1, middle, fg, bg);
        self.front.put_str(cx, cy, &score, Color::White, bg);
        self.front.put_str(cx, cy + 1, prompt, Color::Rgb { r: 80, g: 255, b: 80 }, bg);
        self.front.put_str(cx, cy + 2, bottom, fg, bg);
    }
}

// ── Helpers ──

/// Screen row of a floor position's ceiling; floor 0 sits at the bottom.
fn top_row(level: &Level, floor: f32) -> usize {
    let top_floor = (level.tuning.num_floors - 1) as f32;
    let offset = (top_floor - floor) * FLOOR_H as f32;
    (MAP_ROW as f32 + offset).round().max(0.0) as usize
}

/// Name plate reveal for a floor sliding in.
fn render_partial(name: &str, progress: f32) -> String {
    let shown = ((name.chars().count() as f32) * progress.clamp(0.0, 1.0)) as usize;
    name.chars()
        .enumerate()
        .map(|(i, c)| if i < shown { c } else { '▒' })
        .collect()
}

fn variant_glyph(c: &Character) -> (char, Color) {
    let base = match c.variant {
        Variant::Customer => ('@', Color::Rgb { r: 120, g: 200, b: 255 }),
        Variant::Heavy => ('H', Color::Rgb { r: 255, g: 160, b: 70 }),
        Variant::Runner => ('r', Color::Rgb { r: 80, g: 255, b: 120 }),
        Variant::Horse => ('M', Color::Rgb { r: 180, g: 130, b: 70 }),
        Variant::Ghost => ('G', Color::Rgb { r: 190, g: 190, b: 220 }),
        Variant::Car => ('C', Color::Rgb { r: 200, g: 80, b: 80 }),
        Variant::Renovator => ('R', Color::Rgb { r: 255, g: 220, b: 90 }),
        Variant::BandMember => ('b', Color::Rgb { r: 210, g: 110, b: 255 }),
        Variant::Reverser => ('?', Color::Rgb { r: 230, g: 120, b: 230 }),
        Variant::Cat => ('c', Color::Rgb { r: 240, g: 240, b: 240 }),
    };
    match c.state {
        CharacterState::Escaping => (base.0, Color::Rgb { r: 255, g: 80, b: 80 }),
        CharacterState::Disappearing => (base.0, Color::DarkGrey),
        _ => base,
    }
}
