// Calibration module - linear note-to-LED index mapping

use crate::notes::{MIDI_NOTE_MAX, MIDI_NOTE_MIN};
use crate::types::map_range;

/// Two-anchor linear note-to-LED mapping. Uncalibrated strips fall back to a
/// linear map across the full piano range.
#[derive(Clone, Copy, Debug)]
pub struct Calibration {
    first_note: u8,
    first_led: usize,
    last_note: u8,
    last_led: usize,
    calibrated: bool,
    led_count: usize,
}

impl Calibration {
    pub fn new(led_count: usize) -> Self {
        Calibration {
            first_note: MIDI_NOTE_MIN,
            first_led: 0,
            last_note: MIDI_NOTE_MAX,
            last_led: led_count.saturating_sub(1),
            calibrated: false,
            led_count,
        }
    }

    /// Store new anchors, fully replacing any previous calibration.
    pub fn set(&mut self, first_note: u8, first_led: usize, last_note: u8, last_led: usize) {
        self.first_note = first_note;
        self.first_led = first_led;
        self.last_note = last_note;
        self.last_led = last_led;
        self.calibrated = true;
    }

    /// Revert to the default full-range linear map.
    pub fn clear(&mut self) {
        *self = Calibration::new(self.led_count);
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Map a MIDI note to an LED index. Notes outside the calibrated range
    /// (or the piano range when uncalibrated) resolve to None - skip paint,
    /// never an error.
    pub fn note_to_led(&self, note: u8) -> Option<usize> {
        if self.led_count == 0 {
            return None;
        }

        if !self.calibrated {
            if !(MIDI_NOTE_MIN..=MIDI_NOTE_MAX).contains(&note) {
                return None;
            }
            let led = map_range(
                note as i64,
                MIDI_NOTE_MIN as i64,
                MIDI_NOTE_MAX as i64,
                0,
                self.led_count as i64 - 1,
            );
            return Some(led as usize);
        }

        if note < self.first_note || note > self.last_note {
            return None;
        }
        let led = map_range(
            note as i64,
            self.first_note as i64,
            self.last_note as i64,
            self.first_led as i64,
            self.last_led as i64,
        );
        if led < 0 || led as usize >= self.led_count {
            return None;
        }
        Some(led as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncalibrated_endpoints() {
        let cal = Calibration::new(176);
        assert_eq!(cal.note_to_led(21), Some(0));
        assert_eq!(cal.note_to_led(108), Some(175));
        assert_eq!(cal.note_to_led(60), Some(78));
    }

    #[test]
    fn test_uncalibrated_out_of_piano_range() {
        let cal = Calibration::new(176);
        assert_eq!(cal.note_to_led(20), None);
        assert_eq!(cal.note_to_led(109), None);
    }

    #[test]
    fn test_calibrated_anchors_exact() {
        let mut cal = Calibration::new(176);
        cal.set(21, 0, 108, 175);
        assert_eq!(cal.note_to_led(21), Some(0));
        assert_eq!(cal.note_to_led(108), Some(175));
    }

    #[test]
    fn test_calibrated_out_of_range_is_none() {
        let mut cal = Calibration::new(144);
        cal.set(36, 10, 96, 130);
        assert_eq!(cal.note_to_led(35), None);
        assert_eq!(cal.note_to_led(97), None);
        assert!(cal.note_to_led(36).is_some());
        assert!(cal.note_to_led(96).is_some());
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        let mut cal = Calibration::new(144);
        cal.set(21, 0, 108, 143);

        let mut prev = 0;
        for note in 21..=108 {
            let led = cal.note_to_led(note).unwrap();
            assert!(led >= prev, "note {} mapped backwards", note);
            prev = led;
        }
    }

    #[test]
    fn test_recalibration_replaces_anchors() {
        let mut cal = Calibration::new(176);
        cal.set(21, 0, 108, 175);
        cal.set(36, 20, 96, 150);

        assert_eq!(cal.note_to_led(21), None);
        assert_eq!(cal.note_to_led(36), Some(20));
        assert_eq!(cal.note_to_led(96), Some(150));
    }

    #[test]
    fn test_degenerate_single_note_calibration() {
        let mut cal = Calibration::new(176);
        cal.set(60, 88, 60, 88);
        assert_eq!(cal.note_to_led(60), Some(88));
        assert_eq!(cal.note_to_led(61), None);
    }

    #[test]
    fn test_clear_restores_default_map() {
        let mut cal = Calibration::new(176);
        cal.set(36, 20, 96, 150);
        cal.clear();

        assert!(!cal.is_calibrated());
        assert_eq!(cal.note_to_led(21), Some(0));
        assert_eq!(cal.note_to_led(108), Some(175));
    }

    #[test]
    fn test_empty_strip() {
        let cal = Calibration::new(0);
        assert_eq!(cal.note_to_led(60), None);
    }
}
