use std::fmt;
use std::time::Duration;

use crate::foundation::error::{BakeError, BakeResult};

/// Persisted progress marker of a texture or mesh entry.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BakeState {
    /// Bake cancelled or never started.
    #[default]
    Cancelled,
    /// Waiting in a queue.
    Queued,
    /// Render job in flight.
    Running,
    /// Bake finished.
    Finished,
}

/// Stable identifier independent of the display name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    /// Generate a fresh random (version 4 layout) UUID string.
    pub fn generate() -> Self {
        let raw: u128 = rand::random();
        let mut b = raw.to_be_bytes();
        b[6] = (b[6] & 0x0f) | 0x40;
        b[8] = (b[8] & 0x3f) | 0x80;
        let hex: String = b.iter().map(|x| format!("{x:02x}")).collect();
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    /// Wrap an existing identifier. Empty ids are rejected.
    pub fn new(id: impl Into<String>) -> BakeResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(BakeError::validation("id must be non-empty"));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Linear RGB triple in `0..=1`.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Convert HSV (all components in `0..=1`) to RGB.
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        if s == 0.0 {
            return Self::new(v, v, v);
        }
        let h6 = (h * 6.0).rem_euclid(6.0);
        let i = h6.floor();
        let f = h6 - i;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match i as u32 {
            0 => Self::new(v, t, p),
            1 => Self::new(q, v, p),
            2 => Self::new(p, v, t),
            3 => Self::new(p, q, v),
            4 => Self::new(t, p, v),
            _ => Self::new(v, p, q),
        }
    }

    pub fn to_rgba(self) -> [f32; 4] {
        [self.r, self.g, self.b, 1.0]
    }
}

/// Visually distinct colours, one per material (or object).
pub fn generate_color_set(count: usize) -> Vec<Rgb> {
    (0..count)
        .map(|i| {
            let h = i as f32 / count as f32;
            let v = 1.0 - 0.25 * (i % 4) as f32;
            Rgb::from_hsv(h, 0.9, v)
        })
        .collect()
}

/// Format a wall-clock duration as `MM:SS` (minutes are not wrapped into hours).
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
