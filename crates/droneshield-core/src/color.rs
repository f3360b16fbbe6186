//! Color strings as sent by the simulation service

/// Parse a color string into linear 0..1 RGB.
///
/// Accepts `#rgb`, `#rrggbb`, `0xrrggbb` and a small set of CSS names.
pub fn parse_color(input: &str) -> Option<[f32; 3]> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    let lower = s.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix('#').or_else(|| lower.strip_prefix("0x")) {
        return parse_hex(hex);
    }

    named_color(&lower)
}

fn parse_hex(hex: &str) -> Option<[f32; 3]> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |v: u8| v as f32 / 255.0;
    match hex.len() {
        3 => {
            let mut rgb = [0.0; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = channel(v * 17);
            }
            Some(rgb)
        }
        6 => {
            let value = u32::from_str_radix(hex, 16).ok()?;
            Some([
                channel(((value >> 16) & 0xff) as u8),
                channel(((value >> 8) & 0xff) as u8),
                channel((value & 0xff) as u8),
            ])
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<[f32; 3]> {
    let rgb: [u8; 3] = match name {
        "red" => [255, 0, 0],
        "green" => [0, 128, 0],
        "lime" => [0, 255, 0],
        "blue" => [0, 0, 255],
        "yellow" => [255, 255, 0],
        "orange" => [255, 165, 0],
        "purple" => [128, 0, 128],
        "magenta" | "fuchsia" => [255, 0, 255],
        "cyan" | "aqua" => [0, 255, 255],
        "white" => [255, 255, 255],
        "black" => [0, 0, 0],
        "gray" | "grey" => [128, 128, 128],
        _ => return None,
    };
    Some(rgb.map(|v| v as f32 / 255.0))
}

/// Scale a color toward black; used for disabled agents and destroyed assets
pub fn dim(rgb: [f32; 3], factor: f32) -> [f32; 3] {
    let factor = factor.clamp(0.0, 1.0);
    rgb.map(|c| c * factor)
}
