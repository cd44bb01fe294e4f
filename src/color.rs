use anyhow::{bail, Context};
use glam::Vec3;

/// Parses `#rrggbb`, `0xrrggbb` or `rrggbb` into an sRGB triple in 0..1.
pub fn parse_hex_srgb(text: &str) -> anyhow::Result<Vec3> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("0x"))
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Expected six hex digits in color {:?}", text);
    }

    let value = u32::from_str_radix(digits, 16)
        .with_context(|| format!("Invalid hex color {:?}", text))?;

    Ok(Vec3::new(
        ((value >> 16) & 0xff) as f32 / 255.0,
        ((value >> 8) & 0xff) as f32 / 255.0,
        (value & 0xff) as f32 / 255.0,
    ))
}

/// Parses a hex color and converts it to linear space, which is what the shaders work in.
pub fn parse_hex_linear(text: &str) -> anyhow::Result<Vec3> {
    parse_hex_srgb(text).map(srgb_to_linear)
}

pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    Vec3::from_array(color.to_array().map(|c| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }))
}
