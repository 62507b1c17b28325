//! Random role colors that stay readable on Discord's dark theme.

/// Number of random draws before falling back to the fixed color.
const ATTEMPTS: usize = 24;

const SATURATION_MIN: f64 = 0.75;
const SATURATION_MAX: f64 = 0.95;

/// Lightness band and minimum WCAG relative luminance for a color family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorBand {
    pub light_min: f64,
    pub light_max: f64,
    pub min_luminance: f64,
    /// 0xRRGGBB
    pub fallback: u32,
}

/// Light colors for `<slug>-member`.
pub const MEMBER_BAND: ColorBand = ColorBand {
    light_min: 0.68,
    light_max: 0.82,
    min_luminance: 0.55,
    fallback: 0x93C5FD,
};

/// Deeper colors for `<slug>-leader`.
pub const LEADER_BAND: ColorBand = ColorBand {
    light_min: 0.42,
    light_max: 0.56,
    min_luminance: 0.35,
    fallback: 0x6D28D9,
};

pub fn random_member_color() -> u32 {
    readable_color(MEMBER_BAND, rand::random::<f64>)
}

pub fn random_leader_color() -> u32 {
    readable_color(LEADER_BAND, rand::random::<f64>)
}

/// Draw vivid HSL colors from `next` (uniform in `[0, 1)`) until one is
/// bright enough for `band`.
pub fn readable_color(band: ColorBand, mut next: impl FnMut() -> f64) -> u32 {
    for _ in 0..ATTEMPTS {
        let h = next();
        let s = SATURATION_MIN + next() * (SATURATION_MAX - SATURATION_MIN);
        let l = band.light_min + next() * (band.light_max - band.light_min);

        let (r, g, b) = hsl_to_rgb(h, s, l);
        if relative_luminance(r, g, b) >= band.min_luminance {
            return (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b);
        }
    }
    band.fallback
}

fn wrap01(v: f64) -> f64 {
    v.rem_euclid(1.0)
}

fn to_channel(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// HSL in `[0, 1]` to 8-bit RGB.
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let h = wrap01(h);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);

    if s == 0.0 {
        let v = to_channel(l);
        return (v, v, v);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        to_channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        to_channel(hue_to_rgb(p, q, h)),
        to_channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
    )
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
    let t = wrap01(t);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// WCAG relative luminance of an sRGB color.
pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    0.2126 * srgb_to_linear(f64::from(r) / 255.0)
        + 0.7152 * srgb_to_linear(f64::from(g) / 255.0)
        + 0.0722 * srgb_to_linear(f64::from(b) / 255.0)
}
