// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading [`RenderSettings`] from RON files.
//!
//! Fields left out of the file keep their default value, so a settings file
//! only lists what it overrides:
//!
//! ```ron
//! (
//!     instancing_method: UniformBuffer,
//!     csm_count: 2,
//!     motion_blur: true,
//! )
//! ```

use ember_core::renderer::api::{InstancingMethod, RenderSettings};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading render settings.
#[derive(Error, Debug)]
pub enum LaneError {
    /// The settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings text is not valid RON for [`RenderSettings`].
    #[error("failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// A setting is out of its valid range.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidValue {
        /// Field name.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn invalid(name: &'static str, reason: impl Into<String>) -> LaneError {
    LaneError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

/// Checks the values the back end relies on being in range.
pub fn validate_settings(settings: &RenderSettings) -> Result<(), LaneError> {
    if settings.instancing_method != InstancingMethod::NoInstancing
        && settings.max_instancing_count == 0
    {
        return Err(invalid("max_instancing_count", "must be positive when instancing is on"));
    }
    if settings.instance_buffer_offset_alignment == 0 {
        return Err(invalid("instance_buffer_offset_alignment", "must be positive"));
    }
    if settings.shadow_map_size == 0 {
        return Err(invalid("shadow_map_size", "must be positive"));
    }
    if !(1..=4).contains(&settings.csm_count) {
        return Err(invalid(
            "csm_count",
            format!("{} is outside 1..=4", settings.csm_count),
        ));
    }
    if !(0.0..=1.0).contains(&settings.csm_split_lambda) {
        return Err(invalid(
            "csm_split_lambda",
            format!("{} is outside [0, 1]", settings.csm_split_lambda),
        ));
    }
    if settings.csm_max_distance <= 0.0 {
        return Err(invalid("csm_max_distance", "must be positive"));
    }
    if settings.shadow_cube_map_z_near <= 0.0 {
        return Err(invalid("shadow_cube_map_z_near", "must be positive"));
    }
    if settings.optimized_shadow_projection > 2 {
        return Err(invalid(
            "optimized_shadow_projection",
            format!("{} is not 0, 1 or 2", settings.optimized_shadow_projection),
        ));
    }
    Ok(())
}

/// Parses settings from RON text and validates them.
pub fn parse_settings(text: &str) -> Result<RenderSettings, LaneError> {
    let settings: RenderSettings = ron::de::from_str(text)?;
    validate_settings(&settings)?;
    Ok(settings)
}

/// Reads settings from the RON file at `path`.
pub fn load_settings(path: impl AsRef<Path>) -> Result<RenderSettings, LaneError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let settings = parse_settings(&text)?;
    log::info!(
        "Loaded render settings from {} (instancing: {:?}, {} cascades)",
        path.display(),
        settings.instancing_method,
        settings.csm_count
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = parse_settings("()").expect("empty settings parse");
        assert_eq!(settings, RenderSettings::default());
    }

    #[test]
    fn listed_fields_override_defaults() {
        let settings = parse_settings("(instancing_method: UniformBuffer, csm_count: 2)")
            .expect("settings parse");
        assert_eq!(settings.instancing_method, InstancingMethod::UniformBuffer);
        assert_eq!(settings.csm_count, 2);
        assert_eq!(settings.shadow_map_size, RenderSettings::default().shadow_map_size);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = parse_settings("(csm_count: 6)").unwrap_err();
        assert!(matches!(err, LaneError::InvalidValue { name: "csm_count", .. }));

        let err = parse_settings("(csm_split_lambda: 1.5)").unwrap_err();
        assert!(matches!(err, LaneError::InvalidValue { name: "csm_split_lambda", .. }));
    }

    #[test]
    fn malformed_text_is_a_parse_error() {
        assert!(matches!(parse_settings("(csm_count: "), Err(LaneError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_settings("/nonexistent/ember/settings.ron").unwrap_err();
        assert!(matches!(err, LaneError::Io(_)));
    }
}
