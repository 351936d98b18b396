//! Color parsing and the compile-time adjustment functions usable inside
//! declaration values (`lighten`, `darken`, `fade`).

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

/// Parse `#rgb`, `#rrggbb`, `rgb(...)` or `rgba(...)` literals.
pub fn parse(input: &str) -> Option<Rgba> {
    let trimmed = input.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex);
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("rgba(") || lower.starts_with("rgb(") {
        return parse_rgb_call(&lower);
    }
    None
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let (r, g, b) = match hex.len() {
        6 => (
            u8::from_str_radix(hex.get(0..2)?, 16).ok()?,
            u8::from_str_radix(hex.get(2..4)?, 16).ok()?,
            u8::from_str_radix(hex.get(4..6)?, 16).ok()?,
        ),
        3 => {
            let channel = |i: usize| -> Option<u8> {
                let nibble = u8::from_str_radix(hex.get(i..i + 1)?, 16).ok()?;
                Some(nibble * 16 + nibble)
            };
            (channel(0)?, channel(1)?, channel(2)?)
        }
        _ => return None,
    };
    Some(Rgba { r, g, b, a: 1.0 })
}

fn parse_rgb_call(input: &str) -> Option<Rgba> {
    let open = input.find('(')?;
    let close = input.rfind(')')?;
    let args: Vec<&str> = input.get(open + 1..close)?.split(',').collect();
    if args.len() != 3 && args.len() != 4 {
        return None;
    }
    let r = args[0].trim().parse().ok()?;
    let g = args[1].trim().parse().ok()?;
    let b = args[2].trim().parse().ok()?;
    let a = match args.get(3) {
        Some(raw) => raw.trim().parse().ok()?,
        None => 1.0,
    };
    Some(Rgba { r, g, b, a })
}

/// Parse a `50%` or `0.5` amount into a 0..1 fraction.
pub fn parse_amount(raw: &str) -> Result<f32, String> {
    let cleaned = raw.trim();
    let (number, scale) = match cleaned.strip_suffix('%') {
        Some(number) => (number.trim(), 100.0),
        None => (cleaned, 1.0),
    };
    let value: f32 = number
        .parse()
        .map_err(|_| format!("cannot parse amount '{}'", raw))?;
    Ok((value / scale).clamp(0.0, 1.0))
}

pub fn lighten(color: Rgba, amount: f32) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    with_lightness(color.a, h, s, (l + amount).clamp(0.0, 1.0))
}

pub fn darken(color: Rgba, amount: f32) -> Rgba {
    let (h, s, l) = rgb_to_hsl(color);
    with_lightness(color.a, h, s, (l - amount).clamp(0.0, 1.0))
}

pub fn fade(color: Rgba, amount: f32) -> Rgba {
    Rgba {
        a: amount.clamp(0.0, 1.0),
        ..color
    }
}

pub fn format_hex(color: Rgba) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r, color.g, color.b)
}

pub fn format_rgba(color: Rgba) -> String {
    format!(
        "rgba({},{},{},{})",
        color.r,
        color.g,
        color.b,
        format_alpha(color.a)
    )
}

fn format_alpha(alpha: f32) -> String {
    let mut formatted = format!("{:.4}", alpha);
    while formatted.contains('.') && formatted.ends_with('0') {
        formatted.pop();
    }
    if formatted.ends_with('.') {
        formatted.pop();
    }
    formatted
}

fn rgb_to_hsl(color: Rgba) -> (f32, f32, f32) {
    let r = color.r as f32 / 255.0;
    let g = color.g as f32 / 255.0;
    let b = color.b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d < f32::EPSILON {
        return (0.0, 0.0, l);
    }
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn with_lightness(alpha: f32, h: f32, s: f32, l: f32) -> Rgba {
    if s < f32::EPSILON {
        let gray = to_channel(l);
        return Rgba {
            r: gray,
            g: gray,
            b: gray,
            a: alpha,
        };
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    Rgba {
        r: to_channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
        g: to_channel(hue_to_rgb(p, q, h)),
        b: to_channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
        a: alpha,
    }
}

fn hue_to_rgb(p: f32, q: f32, t: f32) -> f32 {
    let mut t = t;
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
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

fn to_channel(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}
