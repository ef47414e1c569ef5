// Splash module - bounded pool of transient note-on splash effects

use crate::calibration::Calibration;
use crate::types::{add_pixel, hsv_to_rgb};

/// Fixed pool capacity. When full, new splashes are silently dropped and the
/// existing ones finish their natural decay.
pub const MAX_SPLASHES: usize = 16;

/// Brightness lost per tick while a splash decays.
const DECAY_STEP: u8 = 16;

/// One expanding, fading splash centered on the key that triggered it.
#[derive(Clone, Copy, Debug, Default)]
struct Splash {
    center_key: u8,
    width: u8,
    max_width: u8,
    brightness: u8,
    hue: u8,
    active: bool,
}

pub struct SplashPool {
    splashes: [Splash; MAX_SPLASHES],
}

/// Monotonic velocity-to-spread mapping: soft strikes stay narrow (1 LED),
/// hard strikes spread up to 6 LEDs each side.
pub fn velocity_to_width(velocity: u8) -> u8 {
    1 + (velocity.min(127) as u16 * 5 / 127) as u8
}

impl SplashPool {
    pub fn new() -> Self {
        SplashPool {
            splashes: [Splash::default(); MAX_SPLASHES],
        }
    }

    pub fn spawn(&mut self, note: u8, velocity: u8, hue: u8) {
        if let Some(slot) = self.splashes.iter_mut().find(|s| !s.active) {
            *slot = Splash {
                center_key: note,
                width: 0,
                max_width: velocity_to_width(velocity),
                brightness: 255,
                hue,
                active: true,
            };
        }
    }

    pub fn clear(&mut self) {
        for splash in self.splashes.iter_mut() {
            splash.active = false;
        }
    }

    pub fn active_count(&self) -> usize {
        self.splashes.iter().filter(|s| s.active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }

    /// Advance every active splash one tick: grow the ring toward its
    /// velocity-derived maximum, decay brightness, retire spent splashes.
    pub fn step(&mut self, growth: u8) {
        for splash in self.splashes.iter_mut().filter(|s| s.active) {
            splash.width = splash.width.saturating_add(growth).min(splash.max_width);
            splash.brightness = splash.brightness.saturating_sub(DECAY_STEP);
            if splash.brightness == 0 {
                splash.active = false;
            }
        }
    }

    /// Composite all active splashes into the frame. Intensity falls off
    /// linearly with distance from the center LED and blends additively, so
    /// overlapping splashes brighten rather than replace each other.
    pub fn render(&self, frame: &mut [u8], calibration: &Calibration, saturation: u8) {
        let led_count = (frame.len() / 3) as i64;

        for splash in self.splashes.iter().filter(|s| s.active) {
            let Some(center) = calibration.note_to_led(splash.center_key) else {
                continue;
            };
            let center = center as i64;
            let width = splash.width as i64;

            for i in 0..=width {
                let falloff = if width == 0 { 255 } else { 255 - 255 * i / width };
                let level = (falloff * splash.brightness as i64 / 255) as u8;
                if level == 0 {
                    continue;
                }
                let color = hsv_to_rgb(splash.hue, saturation, level);

                let left = center - i;
                if left >= 0 {
                    add_pixel(frame, left as usize, color);
                }
                let right = center + i;
                if i > 0 && right < led_count {
                    add_pixel(frame, right as usize, color);
                }
            }
        }
    }
}

impl Default for SplashPool {
    fn default() -> Self {
        Self::new()
    }
}
