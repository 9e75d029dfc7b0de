//! Filter graph for the time-gated overlay bar.

use bclip_models::OverlayGeometry;

/// Label of the composited video stream in the filter graph.
pub const COMPOSITED_LABEL: &str = "v";

/// Build the filter complex that scales input 1 into a bar and lays it
/// over input 0 for the first `overlay_duration` seconds.
///
/// `eof_action=pass` keeps the main video flowing once the overlay clip
/// runs out of frames.
pub fn build_overlay_filter(width: u32, geometry: OverlayGeometry, overlay_duration: f64) -> String {
    format!(
        "[1:v]scale={width}:{bar}[bar];\
         [0:v][bar]overlay=x=0:y={y}:eof_action=pass:enable='between(t,0,{duration:.3})'[{label}]",
        width = width,
        bar = geometry.bar_height,
        y = geometry.overlay_y,
        duration = overlay_duration.max(0.0),
        label = COMPOSITED_LABEL,
    )
}

/// Contents of a concat-demuxer list file.
pub fn build_concat_list<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<std::path::Path>,
{
    parts
        .into_iter()
        .map(|p| format!("file '{}'\n", escape_concat_path(&p.as_ref().to_string_lossy())))
        .collect()
}

fn escape_concat_path(path: &str) -> String {
    path.replace('\'', "'\\''")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_filter() {
        let geometry = OverlayGeometry {
            bar_height: 45,
            overlay_y: 675,
        };
        let filter = build_overlay_filter(1280, geometry, 3.0);

        assert!(filter.starts_with("[1:v]scale=1280:45[bar];"));
        assert!(filter.contains("overlay=x=0:y=675"));
        assert!(filter.contains("enable='between(t,0,3.000)'"));
        assert!(filter.ends_with("[v]"));
    }

    #[test]
    fn test_negative_duration_is_clamped() {
        let geometry = OverlayGeometry {
            bar_height: 30,
            overlay_y: 330,
        };
        let filter = build_overlay_filter(640, geometry, -1.0);
        assert!(filter.contains("between(t,0,0.000)"));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = build_concat_list(["/tmp/a.mp4", "/tmp/it's.mp4"]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }
}
