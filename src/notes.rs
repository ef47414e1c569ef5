// Note state module - per-key press/velocity/fade tracking for the 88 piano keys

use rand::Rng;

pub const MIDI_NOTE_MIN: u8 = 21; // A0 (lowest piano key)
pub const MIDI_NOTE_MAX: u8 = 108; // C8 (highest piano key)
pub const KEY_COUNT: usize = 88;

/// State of one physical piano key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Key {
    pub pressed: bool,
    pub velocity: u8,
    /// Decaying brightness used by fade-aware modes. Forced to 255 while the
    /// key is held, ramps down to 0 after release.
    pub fade: u8,
    /// Hue captured at note-on (base hue, or the chord-shifted hue).
    pub struck_hue: u8,
}

/// Table of all 88 keys plus the per-key random hues used by RANDOM mode.
pub struct NoteTable {
    keys: [Key; KEY_COUNT],
    assigned_hues: [u8; KEY_COUNT],
}

/// Map a MIDI note number to a key index, or None outside the piano range.
pub fn key_index(note: u8) -> Option<usize> {
    if !(MIDI_NOTE_MIN..=MIDI_NOTE_MAX).contains(&note) {
        return None;
    }
    Some((note - MIDI_NOTE_MIN) as usize)
}

impl NoteTable {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut assigned_hues = [0u8; KEY_COUNT];
        for hue in assigned_hues.iter_mut() {
            *hue = rng.gen();
        }
        NoteTable {
            keys: [Key::default(); KEY_COUNT],
            assigned_hues,
        }
    }

    /// Mark a key pressed. Notes outside the piano range are silently dropped.
    pub fn note_on(&mut self, note: u8, velocity: u8, struck_hue: u8) {
        if let Some(i) = key_index(note) {
            self.keys[i].pressed = true;
            self.keys[i].velocity = velocity;
            self.keys[i].fade = 255;
            self.keys[i].struck_hue = struck_hue;
        }
    }

    /// Mark a key released. The fade level is left for apply_fade to ramp down.
    pub fn note_off(&mut self, note: u8) {
        if let Some(i) = key_index(note) {
            self.keys[i].pressed = false;
        }
    }

    pub fn all_notes_off(&mut self) {
        for key in self.keys.iter_mut() {
            key.pressed = false;
        }
    }

    /// Reset all fade levels (used on mode switches so no pre-switch
    /// brightness carries over).
    pub fn reset_fades(&mut self) {
        for key in self.keys.iter_mut() {
            key.fade = 0;
        }
    }

    /// One fade step, normalized to measured wall-clock time so a late tick
    /// just produces a proportionally larger step. `fade_time_ms == 0` means
    /// instant cutoff.
    pub fn apply_fade(&mut self, elapsed_ms: u64, fade_time_ms: u16) {
        let step = if fade_time_ms == 0 {
            255
        } else {
            ((255 * elapsed_ms) / fade_time_ms as u64).clamp(1, 255) as u8
        };

        for key in self.keys.iter_mut() {
            if key.pressed {
                key.fade = 255;
            } else if key.fade > 0 {
                key.fade = key.fade.saturating_sub(step);
            }
        }
    }

    pub fn key(&self, note: u8) -> Option<&Key> {
        key_index(note).map(|i| &self.keys[i])
    }

    pub fn assigned_hue(&self, note: u8) -> u8 {
        key_index(note).map(|i| self.assigned_hues[i]).unwrap_or(0)
    }

    /// Iterate keys as (MIDI note, key state) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Key)> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| (MIDI_NOTE_MIN + i as u8, key))
    }
}

impl Default for NoteTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_on_sets_state() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 42);

        let key = table.key(60).unwrap();
        assert!(key.pressed);
        assert_eq!(key.velocity, 100);
        assert_eq!(key.fade, 255);
        assert_eq!(key.struck_hue, 42);
    }

    #[test]
    fn test_out_of_range_notes_ignored() {
        let mut table = NoteTable::new();
        table.note_on(20, 100, 0);
        table.note_on(109, 100, 0);
        table.note_off(0);

        assert!(table.iter().all(|(_, key)| !key.pressed));
        assert!(table.key(20).is_none());
        assert!(table.key(109).is_none());
    }

    #[test]
    fn test_note_off_keeps_fade() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_off(60);

        let key = table.key(60).unwrap();
        assert!(!key.pressed);
        assert_eq!(key.fade, 255);
    }

    #[test]
    fn test_all_notes_off() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_on(64, 90, 0);
        table.all_notes_off();

        assert!(table.iter().all(|(_, key)| !key.pressed));
    }

    #[test]
    fn test_fade_forces_full_while_pressed() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.apply_fade(16, 200);
        table.apply_fade(16, 200);

        assert_eq!(table.key(60).unwrap().fade, 255);
    }

    #[test]
    fn test_fade_reaches_zero_in_expected_ticks() {
        // fade 200ms at 16ms ticks: step = 255*16/200 = 20, ceil(255/20) = 13
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_off(60);

        for _ in 0..12 {
            table.apply_fade(16, 200);
        }
        assert!(table.key(60).unwrap().fade > 0);

        table.apply_fade(16, 200);
        assert_eq!(table.key(60).unwrap().fade, 0);
    }

    #[test]
    fn test_fade_idempotent_at_zero() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_off(60);

        for _ in 0..50 {
            table.apply_fade(16, 200);
        }
        assert_eq!(table.key(60).unwrap().fade, 0);

        table.apply_fade(16, 200);
        assert_eq!(table.key(60).unwrap().fade, 0);
    }

    #[test]
    fn test_fade_zero_time_is_instant() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_off(60);
        table.apply_fade(16, 0);

        assert_eq!(table.key(60).unwrap().fade, 0);
    }

    #[test]
    fn test_fade_scales_with_elapsed_time() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_off(60);

        // A doubled tick interval doubles the step (255*32/200 = 40)
        table.apply_fade(32, 200);
        assert_eq!(table.key(60).unwrap().fade, 215);
    }

    #[test]
    fn test_assigned_hues_stable() {
        let table = NoteTable::new();
        let first = table.assigned_hue(60);
        assert_eq!(table.assigned_hue(60), first);
    }

    #[test]
    fn test_reset_fades() {
        let mut table = NoteTable::new();
        table.note_on(60, 100, 0);
        table.note_off(60);
        table.reset_fades();

        assert_eq!(table.key(60).unwrap().fade, 0);
    }
}
