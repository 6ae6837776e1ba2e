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

//! Temporal update throttling of shadow cascades.

use crate::render_lane::context::MAX_CASCADES;

/// Lowest fraction of frames a far cascade is re-rendered on.
pub const MIN_UPDATE_RATIO: f32 = 0.1;

/// Per-cascade accumulators deciding which cascades are re-rendered.
///
/// Every frame each cascade adds its update ratio to its accumulator and is
/// re-rendered once the accumulator reaches one, which is then subtracted.
/// A cascade with ratio `r` is therefore drawn `floor(n * r)` times over `n`
/// frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadeThrottle {
    accumulators: [f32; MAX_CASCADES],
}

impl CascadeThrottle {
    /// Creates a throttle with empty accumulators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update ratio of `cascade` out of `count`.
    ///
    /// Cascades ending within `non_cached_distance` are always refreshed.
    /// Farther ones get `update_ratio` scaled down with their index, never
    /// below [`MIN_UPDATE_RATIO`].
    pub fn update_ratio(
        cascade: usize,
        count: usize,
        split_far: f32,
        update_ratio: f32,
        non_cached_distance: f32,
    ) -> f32 {
        if split_far <= non_cached_distance {
            return 1.0;
        }
        let falloff = 1.0 - cascade as f32 / count as f32;
        (update_ratio * falloff).clamp(MIN_UPDATE_RATIO, 1.0)
    }

    /// Advances one frame and returns which cascades must be re-rendered.
    ///
    /// `distances` holds the `count + 1` split distances of the cascades.
    pub fn advance_frame(
        &mut self,
        distances: &[f32],
        update_ratio: f32,
        non_cached_distance: f32,
    ) -> [bool; MAX_CASCADES] {
        let count = distances.len().saturating_sub(1).min(MAX_CASCADES);
        let mut render = [false; MAX_CASCADES];

        for (cascade, split) in distances.windows(2).take(count).enumerate() {
            let ratio =
                Self::update_ratio(cascade, count, split[1], update_ratio, non_cached_distance);
            let acc = &mut self.accumulators[cascade];
            *acc += ratio;
            if *acc >= 1.0 {
                *acc -= 1.0;
                render[cascade] = true;
            }
        }

        render
    }

    /// Current accumulator of `cascade`.
    #[inline]
    pub fn accumulator(&self, cascade: usize) -> f32 {
        self.accumulators[cascade]
    }

    /// Forgets accumulated progress, so every cascade restarts from zero.
    pub fn reset(&mut self) {
        self.accumulators = [0.0; MAX_CASCADES];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FAR_SPLITS: [f32; 5] = [100.0, 200.0, 300.0, 400.0, 500.0];

    fn count_renders(throttle: &mut CascadeThrottle, frames: usize, ratio: f32) -> [usize; MAX_CASCADES] {
        let mut counts = [0; MAX_CASCADES];
        for _ in 0..frames {
            let render = throttle.advance_frame(&FAR_SPLITS, ratio, 50.0);
            for (count, drawn) in counts.iter_mut().zip(render) {
                *count += drawn as usize;
            }
        }
        counts
    }

    #[test]
    fn test_full_ratio_updates_by_distance() {
        let mut throttle = CascadeThrottle::new();
        let counts = count_renders(&mut throttle, 16, 1.0);
        assert_eq!(counts, [16, 12, 8, 4]);
    }

    #[test]
    fn test_render_count_is_floor_of_accumulated_ratio() {
        let mut throttle = CascadeThrottle::new();
        let counts = count_renders(&mut throttle, 40, 0.25);
        // Cascade 0 accumulates exactly 0.25 per frame.
        assert_eq!(counts[0], 10);
        assert_relative_eq!(throttle.accumulator(0), 0.0);
    }

    #[test]
    fn test_near_cascades_are_never_cached() {
        let mut throttle = CascadeThrottle::new();
        let splits = [1.0, 10.0, 30.0, 45.0, 150.0];
        for _ in 0..3 {
            let render = throttle.advance_frame(&splits, 0.2, 50.0);
            assert!(render[0] && render[1] && render[2]);
        }
    }

    #[test]
    fn test_update_ratio_is_clamped() {
        assert_relative_eq!(CascadeThrottle::update_ratio(3, 4, 400.0, 0.2, 50.0), MIN_UPDATE_RATIO);
        assert_relative_eq!(CascadeThrottle::update_ratio(0, 4, 400.0, 3.0, 50.0), 1.0);
        assert_relative_eq!(CascadeThrottle::update_ratio(3, 4, 40.0, 0.2, 50.0), 1.0);
    }

    #[test]
    fn test_reset_clears_progress() {
        let mut throttle = CascadeThrottle::new();
        throttle.advance_frame(&FAR_SPLITS, 0.5, 50.0);
        assert!(throttle.accumulator(0) > 0.0);
        throttle.reset();
        assert_eq!(throttle, CascadeThrottle::new());
    }
}
