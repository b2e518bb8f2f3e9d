//! Colour parsing, palettes and blending.

use image::Rgba;

use crate::error::{AtlasError, Result};

pub type Color = Rgba<u8>;

/// Low end of every category ramp (#F5F5F5)
pub const NEUTRAL: Color = Rgba([0xF5, 0xF5, 0xF5, 0xFF]);

/// matplotlib's tab10 qualitative palette
const TAB10: [[u8; 3]; 10] = [
    [0x1f, 0x77, 0xb4],
    [0xff, 0x7f, 0x0e],
    [0x2c, 0xa0, 0x2c],
    [0xd6, 0x27, 0x28],
    [0x94, 0x67, 0xbd],
    [0x8c, 0x56, 0x4b],
    [0xe3, 0x77, 0xc2],
    [0x7f, 0x7f, 0x7f],
    [0xbc, 0xbd, 0x22],
    [0x17, 0xbe, 0xcf],
];

const NAMED: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("whitesmoke", [0xf5, 0xf5, 0xf5]),
    ("gray", [0x80, 0x80, 0x80]),
    ("grey", [0x80, 0x80, 0x80]),
    ("lightgray", [0xd3, 0xd3, 0xd3]),
    ("lightgrey", [0xd3, 0xd3, 0xd3]),
    ("darkgray", [0xa9, 0xa9, 0xa9]),
    ("darkgrey", [0xa9, 0xa9, 0xa9]),
    ("red", [0xff, 0, 0]),
    ("darkred", [0x8b, 0, 0]),
    ("green", [0, 0x80, 0]),
    ("darkgreen", [0, 0x64, 0]),
    ("lightgreen", [0x90, 0xee, 0x90]),
    ("limegreen", [0x32, 0xcd, 0x32]),
    ("lime", [0, 0xff, 0]),
    ("blue", [0, 0, 0xff]),
    ("navy", [0, 0, 0x80]),
    ("lightblue", [0xad, 0xd8, 0xe6]),
    ("skyblue", [0x87, 0xce, 0xeb]),
    ("cyan", [0, 0xff, 0xff]),
    ("teal", [0, 0x80, 0x80]),
    ("magenta", [0xff, 0, 0xff]),
    ("purple", [0x80, 0, 0x80]),
    ("orange", [0xff, 0xa5, 0]),
    ("yellow", [0xff, 0xff, 0]),
    ("gold", [0xff, 0xd7, 0]),
    ("brown", [0xa5, 0x2a, 0x2a]),
    ("tan", [0xd2, 0xb4, 0x8c]),
    ("pink", [0xff, 0xc0, 0xcb]),
    ("olive", [0x80, 0x80, 0]),
];

/// Parse `#rrggbb`, `#rrggbbaa`, a tab10 alias (`C0`..`C9`) or a colour name.
///
/// `"none"` parses to `None`.
pub fn parse_color(value: &str) -> Result<Option<Color>> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    if let Some(hex) = value.strip_prefix('#') {
        return hex_to_rgba(hex)
            .map(Some)
            .ok_or_else(|| AtlasError::InvalidOptions(format!("invalid hex colour '{}'", value)));
    }
    if let Some(idx) = value
        .strip_prefix('C')
        .and_then(|d| d.parse::<usize>().ok())
        .filter(|i| *i < TAB10.len())
    {
        let [r, g, b] = TAB10[idx];
        return Ok(Some(Rgba([r, g, b, 255])));
    }

    let lower = value.to_ascii_lowercase();
    NAMED
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, [r, g, b])| Some(Rgba([*r, *g, *b, 255])))
        .ok_or_else(|| AtlasError::InvalidOptions(format!("unknown colour '{}'", value)))
}

fn hex_to_rgba(hex: &str) -> Option<Color> {
    if !matches!(hex.len(), 6 | 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
    Some(Rgba([channel(0)?, channel(2)?, channel(4)?, alpha]))
}

/// tab10 sampled at `linspace(0, 1, n)`, one colour per category
pub fn tab10(n: usize) -> Vec<Color> {
    (0..n)
        .map(|i| {
            let x = if n > 1 {
                i as f64 / (n - 1) as f64
            } else {
                0.0
            };
            let idx = ((x * TAB10.len() as f64) as usize).min(TAB10.len() - 1);
            let [r, g, b] = TAB10[idx];
            Rgba([r, g, b, 255])
        })
        .collect()
}

/// Linear interpolation from `a` (t = 0) to `b` (t = 1)
pub fn lerp(a: Color, b: Color, t: f64) -> Color {
    let t = t.clamp(0.0, 1.0);
    let mix = |i: usize| (a[i] as f64 + (b[i] as f64 - a[i] as f64) * t).round() as u8;
    Rgba([mix(0), mix(1), mix(2), mix(3)])
}

/// Source-over blend of `src` onto `dst`, scaling the source alpha by `alpha`
pub fn blend(dst: &mut Color, src: Color, alpha: f32) {
    let a = (src[3] as f32 / 255.0) * alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = a + da * (1.0 - a);
    for i in 0..3 {
        let c = (src[i] as f32 * a + dst[i] as f32 * da * (1.0 - a)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

/// Copy of `color` with its alpha scaled by `alpha`
pub fn with_alpha(color: Color, alpha: f32) -> Color {
    let a = (color[3] as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
    Rgba([color[0], color[1], color[2], a])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_colors() {
        assert_eq!(parse_color("none").unwrap(), None);
        assert_eq!(
            parse_color("darkgreen").unwrap(),
            Some(Rgba([0, 100, 0, 255]))
        );
        assert_eq!(
            parse_color("#F5F5F5").unwrap(),
            Some(NEUTRAL)
        );
        assert_eq!(
            parse_color("#ff000080").unwrap(),
            Some(Rgba([255, 0, 0, 128]))
        );
        assert_eq!(parse_color("C1").unwrap(), Some(Rgba([0xff, 0x7f, 0x0e, 255])));
        assert!(parse_color("#12345").is_err());
        assert!(parse_color("chartreuse-ish").is_err());
    }

    #[test]
    fn test_tab10_sampling() {
        assert_eq!(tab10(1), vec![Rgba([0x1f, 0x77, 0xb4, 255])]);

        // linspace(0, 1, 4) * 10 -> 0, 3, 6, 10 (clipped to 9)
        let four = tab10(4);
        assert_eq!(four[1], Rgba([0xd6, 0x27, 0x28, 255]));
        assert_eq!(four[3], Rgba([0x17, 0xbe, 0xcf, 255]));

        let ten = tab10(10);
        assert_eq!(ten[0], Rgba([0x1f, 0x77, 0xb4, 255]));
        assert_eq!(ten[9], Rgba([0x17, 0xbe, 0xcf, 255]));
    }

    #[test]
    fn test_lerp_endpoints() {
        let base = Rgba([0x1f, 0x77, 0xb4, 255]);
        assert_eq!(lerp(NEUTRAL, base, 0.0), NEUTRAL);
        assert_eq!(lerp(NEUTRAL, base, 1.0), base);
    }

    #[test]
    fn test_blend_half_alpha_over_white() {
        let mut dst = Rgba([255, 255, 255, 255]);
        blend(&mut dst, Rgba([0, 0, 0, 255]), 0.5);
        assert_eq!(dst, Rgba([128, 128, 128, 255]));

        let mut untouched = Rgba([10, 20, 30, 255]);
        blend(&mut untouched, Rgba([0, 0, 0, 255]), 0.0);
        assert_eq!(untouched, Rgba([10, 20, 30, 255]));
    }
}
