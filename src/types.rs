// Shared types module - color primitives and frame buffer helpers

use anyhow::Result;

/// RGB color representation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            anyhow::bail!("Invalid hex color: {}", hex);
        }
        Ok(Rgb {
            r: u8::from_str_radix(&hex[0..2], 16)?,
            g: u8::from_str_radix(&hex[2..4], 16)?,
            b: u8::from_str_radix(&hex[4..6], 16)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Scale all channels by `level` (255 = identity, 0 = black).
    pub fn scale(self, level: u8) -> Rgb {
        Rgb {
            r: ((self.r as u16 * level as u16) / 255) as u8,
            g: ((self.g as u16 * level as u16) / 255) as u8,
            b: ((self.b as u16 * level as u16) / 255) as u8,
        }
    }
}

/// Convert HSV to RGB. All components are 0-255; hue wraps around the wheel
/// (0 = red, ~85 = green, ~170 = blue).
pub fn hsv_to_rgb(hue: u8, sat: u8, val: u8) -> Rgb {
    let h = hue as f32 * 360.0 / 256.0;
    let s = sat as f32 / 255.0;
    let v = val as f32 / 255.0;

    let c = v * s;
    let h60 = h / 60.0;
    let x = c * (1.0 - (h60 % 2.0 - 1.0).abs());

    let (r1, g1, b1) = if h60 < 1.0 {
        (c, x, 0.0)
    } else if h60 < 2.0 {
        (x, c, 0.0)
    } else if h60 < 3.0 {
        (0.0, c, x)
    } else if h60 < 4.0 {
        (0.0, x, c)
    } else if h60 < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    let m = v - c;
    Rgb {
        r: ((r1 + m) * 255.0 + 0.5) as u8,
        g: ((g1 + m) * 255.0 + 0.5) as u8,
        b: ((b1 + m) * 255.0 + 0.5) as u8,
    }
}

/// Integer linear interpolation in the Arduino map() style (truncating).
pub fn map_range(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    if in_max == in_min {
        return out_min;
    }
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// 8-bit sine: theta 0-255 covers one full cycle, output 0-255 centered at 128.
pub fn sin8(theta: u8) -> u8 {
    let radians = theta as f32 * std::f32::consts::TAU / 256.0;
    ((radians.sin() * 0.5 + 0.5) * 255.0).round() as u8
}

// Frame buffer helpers. Frames are flat RGB byte triplets, one per LED;
// writes outside the buffer are silently dropped so a render tick can
// never panic on a bad index.

pub fn set_pixel(frame: &mut [u8], led: usize, color: Rgb) {
    let offset = led * 3;
    if offset + 3 > frame.len() {
        return;
    }
    frame[offset] = color.r;
    frame[offset + 1] = color.g;
    frame[offset + 2] = color.b;
}

/// Additive blend (saturating), so overlapping effects brighten rather
/// than replace each other.
pub fn add_pixel(frame: &mut [u8], led: usize, color: Rgb) {
    let offset = led * 3;
    if offset + 3 > frame.len() {
        return;
    }
    frame[offset] = frame[offset].saturating_add(color.r);
    frame[offset + 1] = frame[offset + 1].saturating_add(color.g);
    frame[offset + 2] = frame[offset + 2].saturating_add(color.b);
}

pub fn fill_solid(frame: &mut [u8], color: Rgb) {
    for pixel in frame.chunks_exact_mut(3) {
        pixel[0] = color.r;
        pixel[1] = color.g;
        pixel[2] = color.b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let c = Rgb::from_hex("FF8000").unwrap();
        assert_eq!(c, Rgb::new(255, 128, 0));

        let c = Rgb::from_hex("#00FF00").unwrap();
        assert_eq!(c, Rgb::new(0, 255, 0));

        assert!(Rgb::from_hex("FFF").is_err());
        assert!(Rgb::from_hex("GGGGGG").is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let c = Rgb::new(18, 52, 86);
        assert_eq!(Rgb::from_hex(&c.to_hex()).unwrap(), c);
    }

    #[test]
    fn test_scale() {
        let c = Rgb::new(200, 100, 50);
        assert_eq!(c.scale(255), c);
        assert_eq!(c.scale(0), Rgb::BLACK);
        assert_eq!(c.scale(128).r, 100);
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0, 255, 255), Rgb::new(255, 0, 0));

        let green = hsv_to_rgb(85, 255, 255);
        assert!(green.g > 200 && green.r < 50);

        let blue = hsv_to_rgb(170, 255, 255);
        assert!(blue.b > 200 && blue.r < 50);
    }

    #[test]
    fn test_hsv_value_and_saturation() {
        assert_eq!(hsv_to_rgb(123, 255, 0), Rgb::BLACK);

        // Zero saturation gives grey regardless of hue
        let grey = hsv_to_rgb(42, 0, 255);
        assert_eq!(grey.r, grey.g);
        assert_eq!(grey.g, grey.b);
    }

    #[test]
    fn test_map_range() {
        assert_eq!(map_range(21, 21, 108, 0, 175), 0);
        assert_eq!(map_range(108, 21, 108, 0, 175), 175);
        assert_eq!(map_range(60, 21, 108, 0, 175), 78);
        assert_eq!(map_range(127, 0, 127, 160, 0), 0);
        assert_eq!(map_range(0, 0, 127, 160, 0), 160);
        // Degenerate input range resolves to the lower output bound
        assert_eq!(map_range(5, 10, 10, 0, 100), 0);
    }

    #[test]
    fn test_sin8_quarters() {
        assert_eq!(sin8(0), 128);
        assert_eq!(sin8(64), 255);
        assert_eq!(sin8(192), 0);
    }

    #[test]
    fn test_add_pixel_saturates() {
        let mut frame = vec![0u8; 9];
        add_pixel(&mut frame, 1, Rgb::new(200, 10, 0));
        add_pixel(&mut frame, 1, Rgb::new(100, 10, 0));
        assert_eq!(&frame[3..6], &[255, 20, 0]);
    }

    #[test]
    fn test_pixel_writes_out_of_bounds_ignored() {
        let mut frame = vec![0u8; 9];
        set_pixel(&mut frame, 3, Rgb::WHITE);
        add_pixel(&mut frame, 100, Rgb::WHITE);
        assert!(frame.iter().all(|&b| b == 0));
    }
}
