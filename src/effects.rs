// Effects module - per-mode render layers over the note table and calibration
//
// Each mode is a free function from (notes, calibration, params) to pixels so
// the layers stay independently testable; the engine owns dispatch.

use crate::calibration::Calibration;
use crate::engine::{AmbientEffect, Params};
use crate::notes::NoteTable;
use crate::types::{add_pixel, fill_solid, hsv_to_rgb, map_range, set_pixel, sin8, Rgb};

/// FREE_PLAY: pressed keys only, base color scaled by velocity. Binary - no
/// fade tail on release.
pub fn render_free_play(frame: &mut [u8], notes: &NoteTable, cal: &Calibration, params: &Params) {
    for (note, key) in notes.iter() {
        if !key.pressed {
            continue;
        }
        let Some(led) = cal.note_to_led(note) else {
            continue;
        };
        let color = struck_color(key.struck_hue, params);
        let level = (key.velocity as u16 * 2).min(255) as u8;
        set_pixel(frame, led, color.scale(level));
    }
}

/// VISUALIZER: fade-scaled base color, with an optional wave spread around
/// keys that are still held.
pub fn render_visualizer(frame: &mut [u8], notes: &NoteTable, cal: &Calibration, params: &Params) {
    for (note, key) in notes.iter() {
        if key.fade == 0 {
            continue;
        }
        let Some(led) = cal.note_to_led(note) else {
            continue;
        };
        let color = struck_color(key.struck_hue, params);
        set_pixel(frame, led, color.scale(key.fade));

        if params.wave_enabled && key.pressed {
            apply_wave(frame, led, params.wave_width, params.wave_color);
        }
    }
}

/// VELOCITY: hue mapped from strike velocity (127 = warm red, 0 = cool blue),
/// brightness from the fade level.
pub fn render_velocity(frame: &mut [u8], notes: &NoteTable, cal: &Calibration, params: &Params) {
    for (note, key) in notes.iter() {
        if key.fade == 0 {
            continue;
        }
        let Some(led) = cal.note_to_led(note) else {
            continue;
        };
        let hue = map_range(key.velocity as i64, 0, 127, 160, 0) as u8;
        set_pixel(frame, led, hsv_to_rgb(hue, params.saturation, key.fade));
    }
}

/// RANDOM: each key keeps the hue it was assigned at boot; brightness from
/// the fade level.
pub fn render_random(frame: &mut [u8], notes: &NoteTable, cal: &Calibration, params: &Params) {
    for (note, key) in notes.iter() {
        if key.fade == 0 {
            continue;
        }
        let Some(led) = cal.note_to_led(note) else {
            continue;
        };
        let color = hsv_to_rgb(notes.assigned_hue(note), params.saturation, key.fade);
        set_pixel(frame, led, color);
    }
}

/// SPLIT: keys below the split point in the left color, the rest in the
/// right color, scaled by velocity.
pub fn render_split(frame: &mut [u8], notes: &NoteTable, cal: &Calibration, params: &Params) {
    for (note, key) in notes.iter() {
        if !key.pressed {
            continue;
        }
        let Some(led) = cal.note_to_led(note) else {
            continue;
        };
        let color = if note < params.split_point {
            params.split_left_color
        } else {
            params.split_right_color
        };
        let level = (key.velocity as u16 * 2).min(255) as u8;
        set_pixel(frame, led, color.scale(level));
    }
}

/// LEARNING: guide hints are painted first, then pressed keys overwrite them
/// so pressed-and-correct wins over pressed-and-wrong wins over a bare hint.
pub fn render_learning(
    frame: &mut [u8],
    notes: &NoteTable,
    cal: &Calibration,
    params: &Params,
    targets: &[u8],
) {
    for &target in targets {
        if let Some(led) = cal.note_to_led(target) {
            set_pixel(frame, led, params.hint_color);
        }
    }

    for (note, key) in notes.iter() {
        if !key.pressed {
            continue;
        }
        let Some(led) = cal.note_to_led(note) else {
            continue;
        };
        let color = if targets.contains(&note) {
            params.success_color
        } else {
            params.error_color
        };
        set_pixel(frame, led, color);
    }
}

/// AMBIENT: input-independent decorative animations driven by a shared phase
/// counter the engine advances each tick.
pub fn render_ambient(
    frame: &mut [u8],
    params: &Params,
    phase: u8,
    gradient: &colorgrad::Gradient,
) {
    let led_count = frame.len() / 3;

    match params.ambient_effect {
        AmbientEffect::Static => fill_solid(frame, params.base_color),

        AmbientEffect::Gradient => {
            for i in 0..led_count {
                let t = if led_count > 1 {
                    i as f64 / (led_count - 1) as f64
                } else {
                    0.0
                };
                let rgba = gradient.at(t).to_rgba8();
                set_pixel(frame, i, Rgb::new(rgba[0], rgba[1], rgba[2]));
            }
        }

        AmbientEffect::Rainbow => {
            let delta = (255 / led_count.max(1)).max(1) as u32;
            for i in 0..led_count {
                let hue = phase.wrapping_add((i as u32 * delta) as u8);
                set_pixel(frame, i, hsv_to_rgb(hue, 255, 255));
            }
        }

        AmbientEffect::Pulse => {
            // Sine-modulated brightness with a floor so the strip never
            // fully blacks out mid-pulse
            let level = map_range(sin8(phase) as i64, 0, 255, 50, 255) as u8;
            fill_solid(frame, params.base_color.scale(level));
        }

        AmbientEffect::Breathing => {
            fill_solid(frame, params.base_color.scale(sin8(phase)));
        }

        AmbientEffect::Wave => {
            for i in 0..led_count {
                let level = sin8(((i as u32 * 5) as u8).wrapping_add(phase));
                set_pixel(frame, i, params.base_color.scale(level));
            }
        }
    }
}

/// Symmetric wave spread around a center LED: intensity falls off linearly
/// per distance step and blends additively into whatever is already painted.
pub fn apply_wave(frame: &mut [u8], center: usize, width: u8, color: Rgb) {
    let led_count = (frame.len() / 3) as i64;
    let center = center as i64;
    let width = width.max(1) as i64;

    for i in 1..=width {
        let intensity = (255 - 255 * i / width) as u8;
        let scaled = color.scale(intensity);

        let left = center - i;
        if left >= 0 {
            add_pixel(frame, left as usize, scaled);
        }
        let right = center + i;
        if right < led_count {
            add_pixel(frame, right as usize, scaled);
        }
    }
}

fn struck_color(struck_hue: u8, params: &Params) -> Rgb {
    if params.hue_shift_enabled {
        hsv_to_rgb(struck_hue, params.saturation, 255)
    } else {
        params.base_color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(frame: &[u8], led: usize) -> (u8, u8, u8) {
        (frame[led * 3], frame[led * 3 + 1], frame[led * 3 + 2])
    }

    fn setup(led_count: usize) -> (Vec<u8>, NoteTable, Calibration, Params) {
        (
            vec![0u8; led_count * 3],
            NoteTable::new(),
            Calibration::new(led_count),
            Params::default(),
        )
    }

    #[test]
    fn test_free_play_scenario() {
        // noteOn(60,100), white base color, 176 uncalibrated LEDs:
        // LED = map(60, 21, 108, 0, 175) = 78, white scaled by min(200,255)
        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(60, 100, 0);

        render_free_play(&mut frame, &notes, &cal, &params);

        assert_eq!(pixel(&frame, 78), (200, 200, 200));
        assert_eq!(pixel(&frame, 77), (0, 0, 0));
        assert_eq!(pixel(&frame, 79), (0, 0, 0));
    }

    #[test]
    fn test_free_play_ignores_released_keys() {
        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(60, 100, 0);
        notes.note_off(60);

        render_free_play(&mut frame, &notes, &cal, &params);
        assert!(frame.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_visualizer_uses_fade_level() {
        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(60, 100, 0);
        notes.note_off(60);
        notes.apply_fade(16, 200); // fade drops to 235

        render_visualizer(&mut frame, &notes, &cal, &params);
        assert_eq!(pixel(&frame, 78), (235, 235, 235));
    }

    #[test]
    fn test_visualizer_wave_only_while_held() {
        let (mut frame, mut notes, cal, mut params) = setup(176);
        params.wave_enabled = true;
        params.wave_width = 3;
        notes.note_on(60, 100, 0);
        notes.apply_fade(16, 200);

        render_visualizer(&mut frame, &notes, &cal, &params);
        // Neighbors picked up the blue wave falloff: 255 - 255*1/3 = 170
        assert_eq!(pixel(&frame, 77), (0, 0, 170));
        assert_eq!(pixel(&frame, 79), (0, 0, 170));
        assert_eq!(pixel(&frame, 76).2, 85);

        // Released keys still fade but stop radiating
        let mut quiet = vec![0u8; 176 * 3];
        notes.note_off(60);
        render_visualizer(&mut quiet, &notes, &cal, &params);
        assert_eq!(pixel(&quiet, 77), (0, 0, 0));
    }

    #[test]
    fn test_velocity_hue_mapping() {
        // velocity 127 -> hue 0 (red); velocity 1 -> hue ~160 (blue)
        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(69, 127, 0);
        notes.apply_fade(16, 200);
        render_velocity(&mut frame, &notes, &cal, &params);

        let led = cal.note_to_led(69).unwrap();
        let (r, g, b) = pixel(&frame, led);
        assert_eq!((r, g, b), (255, 0, 0));

        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(69, 1, 0);
        notes.apply_fade(16, 200);
        render_velocity(&mut frame, &notes, &cal, &params);

        let (r, _g, b) = pixel(&frame, led);
        assert_eq!(b, 255);
        assert_eq!(r, 0);
    }

    #[test]
    fn test_random_hue_stable_per_key() {
        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(60, 100, 0);
        notes.apply_fade(16, 200);

        render_random(&mut frame, &notes, &cal, &params);
        let first = pixel(&frame, 78);

        let mut again = vec![0u8; 176 * 3];
        render_random(&mut again, &notes, &cal, &params);
        assert_eq!(pixel(&again, 78), first);
    }

    #[test]
    fn test_split_colors_by_note() {
        let (mut frame, mut notes, cal, params) = setup(176);
        notes.note_on(59, 100, 0); // below middle C -> left (red)
        notes.note_on(60, 100, 0); // at the split point -> right (blue)

        render_split(&mut frame, &notes, &cal, &params);

        let left_led = cal.note_to_led(59).unwrap();
        let right_led = cal.note_to_led(60).unwrap();
        assert_eq!(pixel(&frame, left_led), (200, 0, 0));
        assert_eq!(pixel(&frame, right_led), (0, 0, 200));
    }

    #[test]
    fn test_learning_paint_order() {
        let (mut frame, mut notes, cal, params) = setup(176);
        let targets = [60, 62];
        notes.note_on(60, 100, 0); // correct press
        notes.note_on(61, 100, 0); // wrong press

        render_learning(&mut frame, &notes, &cal, &params, &targets);

        let correct = cal.note_to_led(60).unwrap();
        let wrong = cal.note_to_led(61).unwrap();
        let hint = cal.note_to_led(62).unwrap();
        assert_eq!(pixel(&frame, correct), (0, 0, 255));
        assert_eq!(pixel(&frame, wrong), (255, 0, 0));
        assert_eq!(pixel(&frame, hint), (0, 255, 0));
    }

    #[test]
    fn test_ambient_static_fills() {
        let (mut frame, _notes, _cal, mut params) = setup(32);
        params.ambient_effect = AmbientEffect::Static;
        params.base_color = Rgb::new(10, 20, 30);
        let gradient = crate::engine::build_ambient_gradient();

        render_ambient(&mut frame, &params, 0, &gradient);
        assert_eq!(pixel(&frame, 0), (10, 20, 30));
        assert_eq!(pixel(&frame, 31), (10, 20, 30));
    }

    #[test]
    fn test_ambient_gradient_spans_red_to_blue() {
        let (mut frame, _notes, _cal, mut params) = setup(32);
        params.ambient_effect = AmbientEffect::Gradient;
        let gradient = crate::engine::build_ambient_gradient();

        render_ambient(&mut frame, &params, 0, &gradient);
        let (r0, _, b0) = pixel(&frame, 0);
        let (r1, _, b1) = pixel(&frame, 31);
        assert!(r0 > 200 && b0 < 50);
        assert!(b1 > 200 && r1 < 50);
    }

    #[test]
    fn test_ambient_rainbow_varies_across_strip() {
        let (mut frame, _notes, _cal, mut params) = setup(32);
        params.ambient_effect = AmbientEffect::Rainbow;
        let gradient = crate::engine::build_ambient_gradient();

        render_ambient(&mut frame, &params, 0, &gradient);
        assert_ne!(pixel(&frame, 0), pixel(&frame, 16));
    }

    #[test]
    fn test_ambient_breathing_peaks_at_quarter_phase() {
        let (mut frame, _notes, _cal, mut params) = setup(8);
        params.ambient_effect = AmbientEffect::Breathing;
        params.base_color = Rgb::new(100, 100, 100);
        let gradient = crate::engine::build_ambient_gradient();

        render_ambient(&mut frame, &params, 64, &gradient);
        assert_eq!(pixel(&frame, 0), (100, 100, 100));

        let mut dark = vec![0u8; 8 * 3];
        render_ambient(&mut dark, &params, 192, &gradient);
        assert_eq!(dark[0], 0);
    }

    #[test]
    fn test_ambient_pulse_keeps_brightness_floor() {
        let (mut frame, _notes, _cal, mut params) = setup(8);
        params.ambient_effect = AmbientEffect::Pulse;
        params.base_color = Rgb::WHITE;
        let gradient = crate::engine::build_ambient_gradient();

        // Trough of the sine still leaves the floor level lit
        render_ambient(&mut frame, &params, 192, &gradient);
        assert_eq!(frame[0], 50);
    }

    #[test]
    fn test_wave_falloff_and_bounds() {
        let mut frame = vec![0u8; 176 * 3];
        apply_wave(&mut frame, 50, 3, Rgb::new(0, 0, 255));

        assert_eq!(pixel(&frame, 49).2, 170);
        assert_eq!(pixel(&frame, 51).2, 170);
        assert_eq!(pixel(&frame, 48).2, 85);
        assert_eq!(pixel(&frame, 53).2, 0);

        // Near the strip edge nothing panics and nothing wraps
        apply_wave(&mut frame, 0, 3, Rgb::new(0, 0, 255));
        apply_wave(&mut frame, 175, 3, Rgb::new(0, 0, 255));
        assert_eq!(pixel(&frame, 174).2, 170);
    }
}
