//! Overlay bar placement.

use bclip_models::media::MIN_BAR_HEIGHT;
use bclip_models::{BarHeightPolicy, OverlayGeometry};

/// Bar height for a video of `height` pixels.
pub fn bar_height(height: u32, policy: BarHeightPolicy) -> u32 {
    match policy {
        BarHeightPolicy::Thresholds => match height {
            0..=360 => 30,
            361..=720 => 45,
            _ => 60,
        },
        BarHeightPolicy::Proportional => (height / 10).max(MIN_BAR_HEIGHT),
    }
}

/// Place the overlay bar along the bottom edge of the frame.
///
/// Frames shorter than the bar anchor it at y=0 and let the overlay
/// filter clip it, so `overlay_y < height` holds for every height >= 1.
pub fn compute_geometry(height: u32, policy: BarHeightPolicy) -> OverlayGeometry {
    let bar_height = bar_height(height, policy);
    OverlayGeometry {
        bar_height,
        overlay_y: height.saturating_sub(bar_height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_table() {
        let cases = [(240, 30), (360, 30), (361, 45), (720, 45), (721, 60), (2160, 60)];
        for (height, expected) in cases {
            assert_eq!(
                bar_height(height, BarHeightPolicy::Thresholds),
                expected,
                "height {height}"
            );
        }
    }

    #[test]
    fn test_720p_placement() {
        let geometry = compute_geometry(720, BarHeightPolicy::Thresholds);
        assert_eq!(geometry.bar_height, 45);
        assert_eq!(geometry.overlay_y, 675);
    }

    #[test]
    fn test_proportional_policy() {
        assert_eq!(bar_height(1080, BarHeightPolicy::Proportional), 108);
        assert_eq!(bar_height(200, BarHeightPolicy::Proportional), 30);
        let geometry = compute_geometry(1080, BarHeightPolicy::Proportional);
        assert_eq!(geometry.overlay_y, 972);
    }

    #[test]
    fn test_tiny_frames_stay_in_bounds() {
        for policy in [BarHeightPolicy::Thresholds, BarHeightPolicy::Proportional] {
            let geometry = compute_geometry(12, policy);
            assert_eq!(geometry.overlay_y, 0);
            assert!(geometry.bar_height >= 30);
        }
    }

    #[test]
    fn test_invariants_hold_for_all_heights() {
        for policy in [BarHeightPolicy::Thresholds, BarHeightPolicy::Proportional] {
            for height in 1..=4320u32 {
                let geometry = compute_geometry(height, policy);
                assert!(geometry.bar_height >= 30);
                assert!(geometry.overlay_y < height, "height {height}");
            }
        }
    }
}
