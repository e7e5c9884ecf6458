//! Target color specs and matching.
//!
//! A sampled color renders as uppercase `#RRGGBB`. A configured spec is
//! either a full color (compared per channel) or a shorter hex prefix
//! (compared against the rendered string), so one spec can cover a whole
//! hue family.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// RGB color value. Alpha is dropped at capture time and never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create color from hex string (e.g., "#FF0000" or "FF0000").
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

        Some(Self { r, g, b })
    }

    /// Convert to hex string (e.g., "#FF0000").
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self { r: 0, g: 0, b: 0 }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hex prefixes a region watch alerts on when the user supplies no colors
/// of their own.
pub const DEFAULT_TARGET_PREFIXES: [&str; 11] = [
    "#E1B", "#E2B", "#E3B", "#E4B", "#E5B", "#E6B", "#E7B", "#E8B", "#E9B", "#EAB", "#EBB",
];

/// One configured target: a full color or a hex prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpec {
    /// Full 6-digit color, compared per channel.
    Exact(Color),
    /// Canonicalized `#`-prefixed uppercase hex prefix, 1-5 digits.
    Prefix(String),
}

impl ColorSpec {
    /// Parse a single spec. The leading `#` is optional and case is
    /// normalized; 6 hex digits give an exact spec, 1-5 a prefix.
    /// Anything else is unusable and yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let digits = text.trim().trim_start_matches('#');
        if digits.is_empty() || digits.len() > 6 || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return None;
        }
        if digits.len() == 6 {
            Color::from_hex(digits).map(ColorSpec::Exact)
        } else {
            Some(ColorSpec::Prefix(format!("#{}", digits.to_ascii_uppercase())))
        }
    }

    /// Check whether a sampled color satisfies this spec.
    pub fn matches(&self, color: Color) -> bool {
        match self {
            ColorSpec::Exact(target) => color == *target,
            ColorSpec::Prefix(prefix) => color.to_hex().starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for ColorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorSpec::Exact(color) => write!(f, "{}", color),
            ColorSpec::Prefix(prefix) => write!(f, "{}", prefix),
        }
    }
}

/// True if any spec in the set matches. An empty set matches nothing.
pub fn matches_any(color: Color, specs: &[ColorSpec]) -> bool {
    specs.iter().any(|spec| spec.matches(color))
}

/// Parse a comma-separated color list. Unusable entries are skipped with
/// a warning; they can never match anything.
pub fn parse_color_list(text: &str) -> Vec<ColorSpec> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match ColorSpec::parse(entry) {
            Some(spec) => Some(spec),
            None => {
                warn!(entry, "ignoring unusable color spec");
                None
            }
        })
        .collect()
}

/// The built-in prefix list as parsed specs.
pub fn default_target_specs() -> Vec<ColorSpec> {
    DEFAULT_TARGET_PREFIXES
        .iter()
        .filter_map(|prefix| ColorSpec::parse(prefix))
        .collect()
}
