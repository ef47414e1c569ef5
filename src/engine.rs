// Engine module - the LED rendering engine: mode dispatch, parameters, and
// the per-tick update
//
// One engine instance owns the note table, calibration, splash pool, and
// frame buffer. All mutation happens on the control thread that drains the
// input queues; transports and the web surface only enqueue.

use std::time::{Duration, Instant};

use anyhow::Result;
use colorgrad::Color;
use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::device::FrameSink;
use crate::effects;
use crate::notes::{NoteTable, MIDI_NOTE_MAX, MIDI_NOTE_MIN};
use crate::splash::SplashPool;
use crate::types::{fill_solid, hsv_to_rgb, map_range, set_pixel, Rgb};

/// Learning mode supports up to this many simultaneous target notes.
pub const MAX_TARGET_NOTES: usize = 10;

/// Fallback tick length used before the first measured interval.
pub const DEFAULT_TICK_MS: u64 = 16;

/// The single active rendering algorithm. Modes are mutually exclusive;
/// switching clears the frame and all transient fade state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Off,
    FreePlay,
    Visualizer,
    Learning,
    Demo,
    Ambient,
    FallingNotes,
    Split,
    Velocity,
    Random,
}

impl Mode {
    /// Parse a mode name as used by the CLI and settings document.
    pub fn parse(name: &str) -> Option<Mode> {
        match name {
            "off" => Some(Mode::Off),
            "free_play" => Some(Mode::FreePlay),
            "visualizer" | "wave" => Some(Mode::Visualizer),
            "learning" => Some(Mode::Learning),
            "demo" => Some(Mode::Demo),
            "ambient" => Some(Mode::Ambient),
            "falling_notes" => Some(Mode::FallingNotes),
            "split" => Some(Mode::Split),
            "velocity" => Some(Mode::Velocity),
            "random" => Some(Mode::Random),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbientEffect {
    Static,
    Gradient,
    Rainbow,
    Pulse,
    Breathing,
    Wave,
}

/// All per-mode tunables, mutated only through the engine setters.
#[derive(Clone, Debug)]
pub struct Params {
    pub brightness: u8,
    pub base_color: Rgb,
    pub hue: u8,
    pub saturation: u8,
    pub fade_time_ms: u16,
    pub wave_enabled: bool,
    pub wave_width: u8,
    pub wave_speed: u8,
    pub wave_color: Rgb,
    pub splash_enabled: bool,
    pub split_point: u8,
    pub split_left_color: Rgb,
    pub split_right_color: Rgb,
    pub hint_color: Rgb,
    pub success_color: Rgb,
    pub error_color: Rgb,
    pub hue_shift_enabled: bool,
    pub hue_shift_amount: u8,
    pub chord_window_ms: u16,
    pub ambient_effect: AmbientEffect,
    pub ambient_speed: u8,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            brightness: 128,
            base_color: Rgb::WHITE,
            hue: 0,
            saturation: 255,
            fade_time_ms: 200,
            wave_enabled: false,
            wave_width: 3,
            wave_speed: 50,
            wave_color: Rgb::new(0, 0, 255),
            splash_enabled: false,
            split_point: 60, // middle C
            split_left_color: Rgb::new(255, 0, 0),
            split_right_color: Rgb::new(0, 0, 255),
            hint_color: Rgb::new(0, 255, 0),
            success_color: Rgb::new(0, 0, 255),
            error_color: Rgb::new(255, 0, 0),
            hue_shift_enabled: false,
            hue_shift_amount: 10,
            chord_window_ms: 600,
            ambient_effect: AmbientEffect::Rainbow,
            ambient_speed: 50,
        }
    }
}

/// The LED rendering engine. Owns the full visual state and the frame
/// buffer; produces one fully rewritten frame per update call.
pub struct LedEngine {
    enabled: bool,
    mode: Mode,
    params: Params,
    notes: NoteTable,
    calibration: Calibration,
    splashes: SplashPool,
    targets: [u8; MAX_TARGET_NOTES],
    target_count: usize,
    frame: Vec<u8>,
    led_count: usize,
    ambient_phase: u8,
    ambient_gradient: colorgrad::Gradient,
    chord_hue: u8,
    last_note_at: Option<Instant>,
    last_update: Option<Instant>,
}

pub(crate) fn build_ambient_gradient() -> colorgrad::Gradient {
    colorgrad::CustomGradient::new()
        .colors(&[
            Color::from_rgba8(255, 0, 0, 255),
            Color::from_rgba8(0, 0, 255, 255),
        ])
        .build()
        .unwrap()
}

impl LedEngine {
    pub fn new(led_count: usize) -> Self {
        LedEngine {
            enabled: true,
            mode: Mode::FreePlay,
            params: Params::default(),
            notes: NoteTable::new(),
            calibration: Calibration::new(led_count),
            splashes: SplashPool::new(),
            targets: [0; MAX_TARGET_NOTES],
            target_count: 0,
            frame: vec![0; led_count * 3],
            led_count,
            ambient_phase: 0,
            ambient_gradient: build_ambient_gradient(),
            chord_hue: 0,
            last_note_at: None,
            last_update: None,
        }
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn brightness(&self) -> u8 {
        self.params.brightness
    }

    /// Global brightness as the 0.0-1.0 factor applied at frame send time.
    pub fn brightness_factor(&self) -> f32 {
        if self.enabled {
            self.params.brightness as f32 / 255.0
        } else {
            0.0
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    #[cfg(test)]
    pub(crate) fn note_table(&self) -> &NoteTable {
        &self.notes
    }

    #[cfg(test)]
    pub(crate) fn splash_count(&self) -> usize {
        self.splashes.active_count()
    }

    // --- Note events ------------------------------------------------------

    pub fn note_on(&mut self, note: u8, velocity: u8) {
        self.note_on_at(note, velocity, Instant::now());
    }

    /// Note-on with an explicit timestamp (the chord window is measured
    /// against real note arrival times, not render ticks).
    pub fn note_on_at(&mut self, note: u8, velocity: u8, now: Instant) {
        if !(MIDI_NOTE_MIN..=MIDI_NOTE_MAX).contains(&note) {
            return;
        }
        let hue = self.struck_hue(now);
        self.notes.note_on(note, velocity, hue);
        if self.params.splash_enabled {
            self.splashes.spawn(note, velocity, hue);
        }
        self.last_note_at = Some(now);
    }

    pub fn note_off(&mut self, note: u8) {
        self.notes.note_off(note);
    }

    pub fn all_notes_off(&mut self) {
        self.notes.all_notes_off();
    }

    /// Hue captured for this strike: the base hue, shifted once per chord
    /// member when note-ons land inside the chord window.
    fn struck_hue(&mut self, now: Instant) -> u8 {
        if !self.params.hue_shift_enabled {
            return self.params.hue;
        }
        let window = Duration::from_millis(self.params.chord_window_ms as u64);
        let in_chord = self
            .last_note_at
            .map_or(false, |t| now.duration_since(t) <= window);
        self.chord_hue = if in_chord {
            self.chord_hue.wrapping_add(self.params.hue_shift_amount)
        } else {
            self.params.hue
        };
        self.chord_hue
    }

    // --- Mode & parameter setters ----------------------------------------

    /// Switch the active mode. Clears the frame and resets transient fade
    /// and splash state so nothing carries over.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        fill_solid(&mut self.frame, Rgb::BLACK);
        self.notes.reset_fades();
        self.splashes.clear();
        self.ambient_phase = 0;
    }

    /// Cycle through the playable modes (hotkey collaborator).
    pub fn cycle_mode(&mut self) {
        let next = match self.mode {
            Mode::FreePlay => Mode::Visualizer,
            Mode::Visualizer => Mode::Velocity,
            Mode::Velocity => Mode::Random,
            Mode::Random => Mode::Split,
            Mode::Split => Mode::Ambient,
            _ => Mode::FreePlay,
        };
        self.set_mode(next);
    }

    pub fn toggle_enabled(&mut self) {
        self.enabled = !self.enabled;
        if !self.enabled {
            fill_solid(&mut self.frame, Rgb::BLACK);
        }
    }

    pub fn set_brightness(&mut self, value: u8) {
        self.params.brightness = value;
    }

    pub fn adjust_brightness(&mut self, delta: i16) {
        self.params.brightness = (self.params.brightness as i16 + delta).clamp(0, 255) as u8;
    }

    pub fn set_color(&mut self, color: Rgb) {
        self.params.base_color = color;
    }

    pub fn set_hue(&mut self, hue: u8) {
        self.params.hue = hue;
        self.params.base_color = hsv_to_rgb(hue, self.params.saturation, 255);
    }

    pub fn set_saturation(&mut self, saturation: u8) {
        self.params.saturation = saturation;
        self.params.base_color = hsv_to_rgb(self.params.hue, saturation, 255);
    }

    pub fn set_fade_time(&mut self, ms: u16) {
        self.params.fade_time_ms = ms;
    }

    pub fn set_wave_enabled(&mut self, enabled: bool) {
        self.params.wave_enabled = enabled;
    }

    pub fn set_wave_width(&mut self, width: u8) {
        self.params.wave_width = width.clamp(1, 6);
    }

    pub fn adjust_wave_width(&mut self, delta: i8) {
        let width = (self.params.wave_width as i16 + delta as i16).clamp(1, 6);
        self.params.wave_width = width as u8;
    }

    pub fn set_wave_speed(&mut self, speed: u8) {
        self.params.wave_speed = speed;
    }

    pub fn set_wave_color(&mut self, color: Rgb) {
        self.params.wave_color = color;
    }

    pub fn set_splash_enabled(&mut self, enabled: bool) {
        self.params.splash_enabled = enabled;
    }

    pub fn set_split_point(&mut self, note: u8) {
        self.params.split_point = note.clamp(MIDI_NOTE_MIN, MIDI_NOTE_MAX);
    }

    pub fn set_split_colors(&mut self, left: Rgb, right: Rgb) {
        self.params.split_left_color = left;
        self.params.split_right_color = right;
    }

    pub fn set_learning_colors(&mut self, hint: Rgb, success: Rgb, error: Rgb) {
        self.params.hint_color = hint;
        self.params.success_color = success;
        self.params.error_color = error;
    }

    /// Replace the learning targets; anything past the fixed capacity is
    /// silently truncated.
    pub fn set_target_notes(&mut self, notes: &[u8]) {
        self.target_count = notes.len().min(MAX_TARGET_NOTES);
        self.targets[..self.target_count].copy_from_slice(&notes[..self.target_count]);
    }

    pub fn clear_target_notes(&mut self) {
        self.target_count = 0;
    }

    pub fn set_ambient_effect(&mut self, effect: AmbientEffect) {
        self.params.ambient_effect = effect;
        self.ambient_phase = 0;
    }

    pub fn set_ambient_speed(&mut self, speed: u8) {
        self.params.ambient_speed = speed;
    }

    pub fn set_hue_shift_enabled(&mut self, enabled: bool) {
        self.params.hue_shift_enabled = enabled;
    }

    pub fn set_hue_shift_amount(&mut self, amount: u8) {
        self.params.hue_shift_amount = amount;
    }

    pub fn set_chord_window(&mut self, ms: u16) {
        self.params.chord_window_ms = ms;
    }

    pub fn set_calibration(&mut self, first_note: u8, first_led: usize, last_note: u8, last_led: usize) {
        self.calibration.set(first_note, first_led, last_note, last_led);
    }

    pub fn clear_calibration(&mut self) {
        self.calibration.clear();
    }

    // --- Per-tick update --------------------------------------------------

    /// Run one render tick: fade step, active-mode layer, splash overlay.
    /// The frame is fully rewritten; nothing here can fail.
    pub fn update(&mut self, now: Instant) {
        let elapsed_ms = match self.last_update {
            Some(prev) => now.duration_since(prev).as_millis() as u64,
            None => DEFAULT_TICK_MS,
        };
        self.last_update = Some(now);

        self.notes.apply_fade(elapsed_ms, self.params.fade_time_ms);

        fill_solid(&mut self.frame, Rgb::BLACK);
        if !self.enabled {
            return;
        }

        match self.mode {
            Mode::Off => {}
            Mode::FreePlay => {
                effects::render_free_play(&mut self.frame, &self.notes, &self.calibration, &self.params)
            }
            Mode::Visualizer => {
                effects::render_visualizer(&mut self.frame, &self.notes, &self.calibration, &self.params)
            }
            Mode::Learning => effects::render_learning(
                &mut self.frame,
                &self.notes,
                &self.calibration,
                &self.params,
                &self.targets[..self.target_count],
            ),
            // Demo degrades to ambient until a song-playback collaborator exists
            Mode::Demo | Mode::Ambient => {
                self.ambient_phase = self
                    .ambient_phase
                    .wrapping_add(self.params.ambient_speed / 10);
                effects::render_ambient(
                    &mut self.frame,
                    &self.params,
                    self.ambient_phase,
                    &self.ambient_gradient,
                );
            }
            // Blank placeholder pending the song-playback data format
            Mode::FallingNotes => {}
            Mode::Split => {
                effects::render_split(&mut self.frame, &self.notes, &self.calibration, &self.params)
            }
            Mode::Velocity => {
                effects::render_velocity(&mut self.frame, &self.notes, &self.calibration, &self.params)
            }
            Mode::Random => {
                effects::render_random(&mut self.frame, &self.notes, &self.calibration, &self.params)
            }
        }

        if self.splash_overlay_active() {
            let growth = (self.params.wave_speed / 25).max(1);
            self.splashes.step(growth);
            self.splashes
                .render(&mut self.frame, &self.calibration, self.params.saturation);
        }
    }

    fn splash_overlay_active(&self) -> bool {
        matches!(
            self.mode,
            Mode::FreePlay | Mode::Visualizer | Mode::Velocity | Mode::Random | Mode::Split
        ) && !self.splashes.is_empty()
    }

    // --- Blocking boot/status utilities -----------------------------------

    /// Boot-time rainbow sweep: a 20-LED window travels left to right and
    /// back. Blocking; used once at startup.
    pub fn play_startup_animation(&mut self, sink: &mut dyn FrameSink) -> Result<()> {
        const SWEEP_WIDTH: i64 = 20;
        const STEP_DELAY: Duration = Duration::from_millis(5);
        let n = self.led_count as i64;

        for pos in -SWEEP_WIDTH..n + SWEEP_WIDTH {
            fill_solid(&mut self.frame, Rgb::BLACK);
            for i in 0..SWEEP_WIDTH {
                let led = pos + i;
                if led >= 0 && led < n {
                    let hue = map_range(i, 0, SWEEP_WIDTH, 0, 255) as u8;
                    set_pixel(&mut self.frame, led as usize, hsv_to_rgb(hue, 255, 255));
                }
            }
            sink.send_frame(&self.frame, self.brightness_factor())?;
            std::thread::sleep(STEP_DELAY);
        }

        for pos in (-SWEEP_WIDTH..n + SWEEP_WIDTH).rev() {
            fill_solid(&mut self.frame, Rgb::BLACK);
            for i in 0..SWEEP_WIDTH {
                let led = pos - i;
                if led >= 0 && led < n {
                    let hue = map_range(i, 0, SWEEP_WIDTH, 0, 255) as u8;
                    set_pixel(&mut self.frame, led as usize, hsv_to_rgb(hue, 255, 255));
                }
            }
            sink.send_frame(&self.frame, self.brightness_factor())?;
            std::thread::sleep(STEP_DELAY);
        }

        fill_solid(&mut self.frame, Rgb::BLACK);
        sink.send_frame(&self.frame, self.brightness_factor())?;
        Ok(())
    }

    /// Flash the whole strip a number of times (connection indication).
    /// Blocking.
    pub fn show_status(&mut self, color: Rgb, flashes: u8, sink: &mut dyn FrameSink) -> Result<()> {
        const FLASH: Duration = Duration::from_millis(100);

        for _ in 0..flashes {
            fill_solid(&mut self.frame, color);
            sink.send_frame(&self.frame, self.brightness_factor())?;
            std::thread::sleep(FLASH);

            fill_solid(&mut self.frame, Rgb::BLACK);
            sink.send_frame(&self.frame, self.brightness_factor())?;
            std::thread::sleep(FLASH);
        }
        Ok(())
    }
}

/// Control-surface command: one variant per engine setter, JSON-tagged for
/// the WebSocket and REST APIs. Colors travel as hex strings; unparsable
/// values are dropped, out-of-range values clamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    AllNotesOff,
    SetMode { mode: Mode },
    CycleMode,
    ToggleEnabled,
    SetBrightness { value: u8 },
    AdjustBrightness { delta: i16 },
    SetColor { color: String },
    SetHue { value: u8 },
    SetSaturation { value: u8 },
    SetFadeTime { ms: u16 },
    SetWaveEnabled { enabled: bool },
    SetWaveWidth { value: u8 },
    AdjustWaveWidth { delta: i8 },
    SetWaveSpeed { value: u8 },
    SetWaveColor { color: String },
    SetSplashEnabled { enabled: bool },
    SetSplitPoint { note: u8 },
    SetSplitColors { left: String, right: String },
    SetLearningColors { hint: String, success: String, error: String },
    SetTargetNotes { notes: Vec<u8> },
    ClearTargetNotes,
    SetAmbientEffect { effect: AmbientEffect },
    SetAmbientSpeed { value: u8 },
    SetHueShiftEnabled { enabled: bool },
    SetHueShiftAmount { value: u8 },
    SetChordWindow { ms: u16 },
    SetCalibration { first_note: u8, first_led: usize, last_note: u8, last_led: usize },
    ClearCalibration,
}

impl LedEngine {
    /// Apply one control-surface command. Each call is a discrete atomic
    /// state mutation on the control thread.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::AllNotesOff => self.all_notes_off(),
            Command::SetMode { mode } => self.set_mode(mode),
            Command::CycleMode => self.cycle_mode(),
            Command::ToggleEnabled => self.toggle_enabled(),
            Command::SetBrightness { value } => self.set_brightness(value),
            Command::AdjustBrightness { delta } => self.adjust_brightness(delta),
            Command::SetColor { color } => {
                if let Ok(rgb) = Rgb::from_hex(&color) {
                    self.set_color(rgb);
                }
            }
            Command::SetHue { value } => self.set_hue(value),
            Command::SetSaturation { value } => self.set_saturation(value),
            Command::SetFadeTime { ms } => self.set_fade_time(ms),
            Command::SetWaveEnabled { enabled } => self.set_wave_enabled(enabled),
            Command::SetWaveWidth { value } => self.set_wave_width(value),
            Command::AdjustWaveWidth { delta } => self.adjust_wave_width(delta),
            Command::SetWaveSpeed { value } => self.set_wave_speed(value),
            Command::SetWaveColor { color } => {
                if let Ok(rgb) = Rgb::from_hex(&color) {
                    self.set_wave_color(rgb);
                }
            }
            Command::SetSplashEnabled { enabled } => self.set_splash_enabled(enabled),
            Command::SetSplitPoint { note } => self.set_split_point(note),
            Command::SetSplitColors { left, right } => {
                if let (Ok(left), Ok(right)) = (Rgb::from_hex(&left), Rgb::from_hex(&right)) {
                    self.set_split_colors(left, right);
                }
            }
            Command::SetLearningColors { hint, success, error } => {
                if let (Ok(hint), Ok(success), Ok(error)) = (
                    Rgb::from_hex(&hint),
                    Rgb::from_hex(&success),
                    Rgb::from_hex(&error),
                ) {
                    self.set_learning_colors(hint, success, error);
                }
            }
            Command::SetTargetNotes { notes } => self.set_target_notes(&notes),
            Command::ClearTargetNotes => self.clear_target_notes(),
            Command::SetAmbientEffect { effect } => self.set_ambient_effect(effect),
            Command::SetAmbientSpeed { value } => self.set_ambient_speed(value),
            Command::SetHueShiftEnabled { enabled } => self.set_hue_shift_enabled(enabled),
            Command::SetHueShiftAmount { value } => self.set_hue_shift_amount(value),
            Command::SetChordWindow { ms } => self.set_chord_window(ms),
            Command::SetCalibration { first_note, first_led, last_note, last_led } => {
                self.set_calibration(first_note, first_led, last_note, last_led)
            }
            Command::ClearCalibration => self.clear_calibration(),
        }
    }
}
