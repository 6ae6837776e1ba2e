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

//! Color space helpers.
//!
//! Colors travel through the back end as [`Vec3`]/[`Vec4`] in linear space.
//! Authoring colors are sRGB and converted only when the target performs an
//! sRGB encode on write.

use super::{Vec3, Vec4};

/// Converts an sRGB component to linear space.
///
/// # Examples
///
/// ```
/// use ember_core::math::color::srgb_to_linear;
/// assert_eq!(srgb_to_linear(0.0), 0.0);
/// assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
/// ```
#[inline]
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Converts a linear component to sRGB space.
#[inline]
pub fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.0031308 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Converts the RGB part of an sRGB color to linear space.
#[inline]
pub fn srgb_to_linear_rgb(c: Vec3) -> Vec3 {
    Vec3::new(srgb_to_linear(c.x), srgb_to_linear(c.y), srgb_to_linear(c.z))
}

/// Converts the RGB part of an sRGB color to linear space, alpha untouched.
#[inline]
pub fn srgb_to_linear_rgba(c: Vec4) -> Vec4 {
    Vec4::from_vec3(srgb_to_linear_rgb(c.truncate()), c.w)
}
