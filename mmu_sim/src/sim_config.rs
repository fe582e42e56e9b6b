/*
 *  Copyright (C) 2025  Markus Elias Gerber
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::{collections::HashMap, fs, path::Path, time::Duration};

use log::warn;

use crate::error::ProfileError;

const DEFAULT_COLUMNS: usize = 46;
const DEFAULT_ROWS: usize = 18;
const DEFAULT_PAGE_SIZE: usize = 64;
const DEFAULT_TLB_CAPACITY: usize = 32;
const DEFAULT_SPEED_MS: u64 = 100;

/// Parameters of one simulation run.
///
/// All sizes are assumed to be positive. A running driver never sees a
/// changed config, build a new one instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimConfig {
    /// tokens per frame
    pub page_size: usize,
    pub tlb_capacity: usize,
    pub frame_count: usize,

    /// pause between two cycles
    pub cycle_duration: Duration,

    /// seed of the arrival generator, random if `None`
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            tlb_capacity: DEFAULT_TLB_CAPACITY,
            frame_count: DEFAULT_COLUMNS * DEFAULT_ROWS,
            cycle_duration: Duration::from_millis(DEFAULT_SPEED_MS),
            seed: None,
        }
    }
}

/// A named configuration, frames are laid out as a `columns x rows` grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub columns: usize,
    pub rows: usize,
    pub config: SimConfig,
}

/// Reads profiles from a file, see [`parse_profiles`]
pub fn load_profiles<P: AsRef<Path>>(path: P) -> Result<Vec<Profile>, ProfileError> {
    let content = fs::read_to_string(path)?;
    parse_profiles(&content)
}

/// Parses profiles in file order.
///
/// ```text
/// # comment
/// [Small]
/// columns = 10
/// rows = 4
/// page_size = 8
/// tlb_size = 4
/// speed_ms = 50
/// ```
///
/// Profiles with missing or non-positive sizes are skipped with a warning.
pub fn parse_profiles(content: &str) -> Result<Vec<Profile>, ProfileError> {
    let mut profiles = Vec::new();
    let mut current: Option<(String, HashMap<String, String>)> = None;

    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            if let Some((name, properties)) = current.take() {
                profiles.extend(build_profile(name, &properties));
            }

            let name = line[1..line.len() - 1].trim().to_string();
            current = Some((name, HashMap::new()));
        } else if let Some((key, value)) = line.split_once('=') {
            let (_, properties) = current.as_mut().ok_or_else(|| ProfileError::Syntax {
                line: i + 1,
                message: "property outside of a [profile] section".to_string(),
            })?;

            properties.insert(key.trim().to_string(), value.trim().to_string());
        } else {
            return Err(ProfileError::Syntax {
                line: i + 1,
                message: format!("expected `[name]` or `key = value`, found `{}`", line),
            });
        }
    }

    if let Some((name, properties)) = current.take() {
        profiles.extend(build_profile(name, &properties));
    }

    Ok(profiles)
}

fn build_profile(name: String, properties: &HashMap<String, String>) -> Option<Profile> {
    if properties.is_empty() {
        return None;
    }

    let read = |key: &str| -> Option<usize> {
        match properties.get(key).map(|value| value.parse::<usize>()) {
            Some(Ok(value)) if value > 0 => Some(value),
            Some(Ok(_)) | None => {
                warn!("invalid profile {}: `{}` has to be positive", name, key);
                None
            }
            Some(Err(err)) => {
                warn!("invalid profile {}: cannot parse `{}`: {}", name, key, err);
                None
            }
        }
    };

    let columns = read("columns")?;
    let rows = read("rows")?;
    let page_size = read("page_size")?;
    let tlb_capacity = read("tlb_size")?;
    let speed_ms = match properties.get("speed_ms") {
        Some(_) => read("speed_ms")? as u64,
        None => DEFAULT_SPEED_MS,
    };

    Some(Profile {
        config: SimConfig {
            page_size,
            tlb_capacity,
            frame_count: columns * rows,
            cycle_duration: Duration::from_millis(speed_ms),
            seed: None,
        },
        name,
        columns,
        rows,
    })
}
