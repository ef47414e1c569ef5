// Settings module - flat JSON settings document, loaded once at boot and
// pushed into the engine through its setters
//
// The engine never parses JSON itself; this module owns the document, its
// defaults, clamping, and the file watcher used for hot-reload.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;

use crate::engine::{AmbientEffect, LedEngine, Mode};
use crate::notes::{MIDI_NOTE_MAX, MIDI_NOTE_MIN};
use crate::types::Rgb;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub led_count: usize,
    pub brightness: u8,
    pub color: String,
    pub mode: Mode,
    pub fade_time_ms: u16,

    pub wave_enabled: bool,
    pub wave_width: u8,
    pub wave_speed: u8,
    pub wave_color: String,
    pub splash_enabled: bool,

    pub split_point: u8,
    pub split_left_color: String,
    pub split_right_color: String,

    pub hint_color: String,
    pub success_color: String,
    pub error_color: String,

    pub hue_shift_enabled: bool,
    pub hue_shift_amount: u8,
    pub chord_window_ms: u16,

    pub ambient_effect: AmbientEffect,
    pub ambient_speed: u8,

    pub first_note: u8,
    pub first_led: usize,
    pub last_note: u8,
    pub last_led: usize,
    pub calibrated: bool,

    pub wled_ip: String,
    pub midi_device: String,
    pub fps: u16,
    pub httpd_enabled: bool,
    pub httpd_port: u16,

    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            led_count: 176,
            brightness: 128,
            color: "FFFFFF".to_string(),
            mode: Mode::FreePlay,
            fade_time_ms: 200,
            wave_enabled: false,
            wave_width: 3,
            wave_speed: 50,
            wave_color: "0000FF".to_string(),
            splash_enabled: false,
            split_point: 60,
            split_left_color: "FF0000".to_string(),
            split_right_color: "0000FF".to_string(),
            hint_color: "00FF00".to_string(),
            success_color: "0000FF".to_string(),
            error_color: "FF0000".to_string(),
            hue_shift_enabled: false,
            hue_shift_amount: 10,
            chord_window_ms: 600,
            ambient_effect: AmbientEffect::Rainbow,
            ambient_speed: 50,
            first_note: MIDI_NOTE_MIN,
            first_led: 0,
            last_note: MIDI_NOTE_MAX,
            last_led: 175,
            calibrated: false,
            wled_ip: "wled.local".to_string(),
            midi_device: "".to_string(), // empty = first available port
            fps: 60,
            httpd_enabled: true,
            httpd_port: 8080,
            path: None,
        }
    }
}

fn sanitize_color(value: &mut String, fallback: &str) {
    *value = value.trim().to_string();
    if Rgb::from_hex(value).is_err() {
        *value = fallback.to_string();
    }
}

impl Settings {
    /// Default settings path: ~/.config/pianoled/settings.json
    pub fn config_path(custom: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = custom {
            return Ok(PathBuf::from(path));
        }
        let home = std::env::var("HOME").context("HOME not set")?;
        let dir = PathBuf::from(home).join(".config").join("pianoled");
        std::fs::create_dir_all(&dir)?;
        Ok(dir.join("settings.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut parsed: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        parsed.path = Some(path.to_path_buf());
        parsed.sanitize();
        Ok(parsed)
    }

    /// Load from the resolved path, writing defaults there on first run.
    pub fn load_or_create(custom: Option<&str>) -> Result<Self> {
        let path = Self::config_path(custom)?;
        if !path.exists() {
            let mut defaults = Settings::default();
            defaults.path = Some(path.clone());
            defaults.save()?;
            println!("✓ Created default settings at {}", path.display());
            return Ok(defaults);
        }
        Self::load(&path)
    }

    pub fn save(&self) -> Result<()> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => Self::config_path(None)?,
        };
        let mut sanitized = self.clone();
        sanitized.sanitize();
        let contents = serde_json::to_string_pretty(&sanitized)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Clamp out-of-range values instead of rejecting the document.
    pub fn sanitize(&mut self) {
        self.led_count = self.led_count.clamp(1, 4096);
        self.wave_width = self.wave_width.clamp(1, 6);
        self.split_point = self.split_point.clamp(MIDI_NOTE_MIN, MIDI_NOTE_MAX);
        self.first_note = self.first_note.clamp(MIDI_NOTE_MIN, MIDI_NOTE_MAX);
        self.last_note = self.last_note.clamp(MIDI_NOTE_MIN, MIDI_NOTE_MAX);
        if self.first_led >= self.led_count {
            self.first_led = 0;
        }
        if self.last_led >= self.led_count {
            self.last_led = self.led_count - 1;
        }
        self.fps = self.fps.clamp(1, 240);
        self.httpd_port = self.httpd_port.max(1);
        self.wled_ip = self.wled_ip.trim().to_string();
        self.midi_device = self.midi_device.trim().to_string();

        sanitize_color(&mut self.color, "FFFFFF");
        sanitize_color(&mut self.wave_color, "0000FF");
        sanitize_color(&mut self.split_left_color, "FF0000");
        sanitize_color(&mut self.split_right_color, "0000FF");
        sanitize_color(&mut self.hint_color, "00FF00");
        sanitize_color(&mut self.success_color, "0000FF");
        sanitize_color(&mut self.error_color, "FF0000");
    }

    /// Push every persisted value into the engine through its setters.
    pub fn apply_to(&self, engine: &mut LedEngine) {
        engine.set_brightness(self.brightness);
        if let Ok(color) = Rgb::from_hex(&self.color) {
            engine.set_color(color);
        }
        engine.set_fade_time(self.fade_time_ms);

        engine.set_wave_enabled(self.wave_enabled);
        engine.set_wave_width(self.wave_width);
        engine.set_wave_speed(self.wave_speed);
        if let Ok(color) = Rgb::from_hex(&self.wave_color) {
            engine.set_wave_color(color);
        }
        engine.set_splash_enabled(self.splash_enabled);

        engine.set_split_point(self.split_point);
        if let (Ok(left), Ok(right)) = (
            Rgb::from_hex(&self.split_left_color),
            Rgb::from_hex(&self.split_right_color),
        ) {
            engine.set_split_colors(left, right);
        }

        if let (Ok(hint), Ok(success), Ok(error)) = (
            Rgb::from_hex(&self.hint_color),
            Rgb::from_hex(&self.success_color),
            Rgb::from_hex(&self.error_color),
        ) {
            engine.set_learning_colors(hint, success, error);
        }

        engine.set_hue_shift_enabled(self.hue_shift_enabled);
        engine.set_hue_shift_amount(self.hue_shift_amount);
        engine.set_chord_window(self.chord_window_ms);

        engine.set_ambient_effect(self.ambient_effect);
        engine.set_ambient_speed(self.ambient_speed);

        if self.calibrated {
            engine.set_calibration(self.first_note, self.first_led, self.last_note, self.last_led);
        }

        engine.set_mode(self.mode);
    }
}

/// Watch the settings file and signal the render loop when it changes.
/// The returned watcher must be kept alive for the watch to stay active.
pub fn spawn_settings_watcher(path: &Path, tx: Sender<()>) -> Result<notify::RecommendedWatcher> {
    use notify::{RecursiveMode, Watcher};

    let mut watcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() {
                    let _ = tx.send(());
                }
            }
        })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
