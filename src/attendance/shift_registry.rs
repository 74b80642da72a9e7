use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveTime;
use once_cell::sync::Lazy;

use crate::model::shift::ShiftProfile;

pub const DEFAULT_SHIFT: &str = "General";

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn profile(
    name: &str,
    start: NaiveTime,
    end: NaiveTime,
    grace_period_minutes: u32,
    half_day_cutoff: NaiveTime,
    is_night_shift: bool,
) -> ShiftProfile {
    ShiftProfile {
        name: name.to_string(),
        start_time: start,
        end_time: end,
        grace_period_minutes,
        min_half_day_hours: 4.0,
        min_full_day_hours: 7.0,
        half_day_cutoff,
        is_night_shift,
    }
}

static BUILTIN_PROFILES: Lazy<Vec<ShiftProfile>> = Lazy::new(|| {
    vec![
        profile(DEFAULT_SHIFT, at(9, 0), at(18, 0), 15, at(13, 0), false),
        profile("Morning", at(6, 0), at(14, 0), 10, at(10, 0), false),
        profile("Evening", at(14, 0), at(22, 0), 10, at(18, 0), false),
        profile("Site", at(8, 0), at(17, 0), 30, at(12, 30), false),
        profile("Night", at(22, 0), at(6, 0), 15, at(2, 0), true),
    ]
});

/// Immutable shift lookup, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct ShiftRegistry {
    profiles: HashMap<String, ShiftProfile>,
}

impl ShiftRegistry {
    pub fn builtin() -> Self {
        Self::with_overrides(Vec::new())
    }

    /// Built-in profiles plus `overrides`, which replace built-ins of the same name.
    pub fn with_overrides(overrides: Vec<ShiftProfile>) -> Self {
        let profiles = BUILTIN_PROFILES
            .iter()
            .cloned()
            .chain(overrides)
            .map(|profile| (profile.name.to_lowercase(), profile))
            .collect();
        Self { profiles }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading shift profiles from {}", path.display()))?;
        let overrides: Vec<ShiftProfile> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing shift profiles in {}", path.display()))?;
        Ok(Self::with_overrides(overrides))
    }

    /// Unknown or missing names fall back to the General profile.
    pub fn resolve(&self, shift_name: Option<&str>) -> &ShiftProfile {
        shift_name
            .and_then(|name| self.profiles.get(&name.trim().to_lowercase()))
            .unwrap_or_else(|| self.default_profile())
    }

    pub fn default_profile(&self) -> &ShiftProfile {
        // General is always seeded from BUILTIN_PROFILES and may only be replaced.
        &self.profiles[&DEFAULT_SHIFT.to_lowercase()]
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}
