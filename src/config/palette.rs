use once_cell::sync::Lazy;
use regex::Regex;

/// Colors offered when editing a category, in display order.
const COLOR_OPTIONS: [u32; 19] = [
    0xFFF4_4336,
    0xFFE9_1E63,
    0xFF9C_27B0,
    0xFF67_3AB7,
    0xFF3F_51B5,
    0xFF21_96F3,
    0xFF03_A9F4,
    0xFF00_BCD4,
    0xFF00_9688,
    0xFF4C_AF50,
    0xFF8B_C34A,
    0xFFCD_DC39,
    0xFFFF_EB3B,
    0xFFFF_C107,
    0xFFFF_9800,
    0xFFFF_5722,
    0xFF79_5548,
    0xFF9E_9E9E,
    0xFF60_7D8B,
];

/// Categories inserted into a fresh database.
pub const SEED_CATEGORIES: [(&str, u32); 5] = [
    ("Work", 0xFF4C_AF50),
    ("Study", 0xFFFF_9800),
    ("Life", 0xFF9C_27B0),
    ("Ideas", 0xFF60_7D8B),
    ("Shopping", 0xFFFF_5722),
];

#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<u32>,
}

impl ColorPalette {
    pub fn contains(&self, color: u32) -> bool {
        self.colors.contains(&color)
    }

    pub fn all(&self) -> impl Iterator<Item = u32> + '_ {
        self.colors.iter().copied()
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self {
            colors: COLOR_OPTIONS.to_vec(),
        }
    }
}

/// Accepts `#RRGGBB`, `#AARRGGBB`, `0x`-prefixed or bare hex. Six-digit
/// colors are made fully opaque.
pub fn parse_color(raw: &str) -> Option<u32> {
    static HEX: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?:#|0[xX])?([0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").expect("valid color regex")
    });
    let caps = HEX.captures(raw.trim())?;
    let digits = caps.get(1)?.as_str();
    let value = u32::from_str_radix(digits, 16).ok()?;
    if digits.len() == 6 {
        Some(0xFF00_0000 | value)
    } else {
        Some(value)
    }
}

pub fn format_color(color: u32) -> String {
    format!("#{color:08X}")
}
