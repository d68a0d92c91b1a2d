//! SVG line chart of the snapshot series.
//!
//! Two series share the x axis (one point per stored date): video count on
//! the left axis and total minutes on the right.

use crate::database::models::SnapshotDbModel;

const WIDTH: i64 = 960;
const HEIGHT: i64 = 540;
const MARGIN_LEFT: i64 = 80;
const MARGIN_RIGHT: i64 = 80;
const MARGIN_TOP: i64 = 60;
const MARGIN_BOTTOM: i64 = 100;

const COUNT_COLOR: &str = "#1f77b4";
const MINUTES_COLOR: &str = "#ff7f0e";

/// Horizontal grid lines, not counting the baseline.
const Y_TICKS: i64 = 5;
/// Upper bound on date labels along the x axis.
const MAX_X_LABELS: usize = 12;

/// Smallest 1, 2 or 5 times a power of ten that is at least `max`.
pub fn nice_ceiling(max: i64) -> i64 {
    if max <= 0 {
        return 1;
    }
    let mut magnitude = 1i64;
    while let Some(next) = magnitude.checked_mul(10).filter(|next| *next <= max) {
        magnitude = next;
    }
    [1, 2, 5, 10]
        .into_iter()
        .map(|factor| magnitude.saturating_mul(factor))
        .find(|candidate| *candidate >= max)
        .unwrap_or(i64::MAX)
}

struct Plot {
    points: usize,
}

impl Plot {
    fn width(&self) -> i64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn height(&self) -> i64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn x(&self, index: usize) -> f64 {
        if self.points <= 1 {
            return (MARGIN_LEFT + self.width() / 2) as f64;
        }
        MARGIN_LEFT as f64 + index as f64 * self.width() as f64 / (self.points - 1) as f64
    }

    fn y(&self, value: i64, ceiling: i64) -> f64 {
        let fraction = value as f64 / ceiling as f64;
        (MARGIN_TOP + self.height()) as f64 - fraction * self.height() as f64
    }
}

/// Render `snapshots` (already ordered by date) as a standalone SVG document.
pub fn render_svg(snapshots: &[SnapshotDbModel]) -> String {
    let plot = Plot {
        points: snapshots.len(),
    };
    let count_ceiling = nice_ceiling(snapshots.iter().map(|s| s.video_count).max().unwrap_or(0));
    let minutes_ceiling =
        nice_ceiling(snapshots.iter().map(|s| s.total_minutes).max().unwrap_or(0));

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    svg.push_str(&format!(
        r#"<rect width="{WIDTH}" height="{HEIGHT}" fill="white"/><text x="{}" y="30" text-anchor="middle" font-size="18">YouTube playlist over time</text>"#,
        WIDTH / 2
    ));

    let baseline = MARGIN_TOP + plot.height();
    let right = MARGIN_LEFT + plot.width();
    for tick in 0..=Y_TICKS {
        let y = baseline - tick * plot.height() / Y_TICKS;
        svg.push_str(&format!(
            r##"<line x1="{MARGIN_LEFT}" y1="{y}" x2="{right}" y2="{y}" stroke="#ddd"/><text x="{}" y="{}" text-anchor="end" fill="{COUNT_COLOR}">{}</text><text x="{}" y="{}" fill="{MINUTES_COLOR}">{}</text>"##,
            MARGIN_LEFT - 8,
            y + 4,
            count_ceiling.saturating_mul(tick) / Y_TICKS,
            right + 8,
            y + 4,
            minutes_ceiling.saturating_mul(tick) / Y_TICKS,
        ));
    }

    let stride = snapshots.len().div_ceil(MAX_X_LABELS).max(1);
    for (index, snapshot) in snapshots.iter().enumerate().step_by(stride) {
        let x = plot.x(index);
        svg.push_str(&format!(
            r#"<text x="{x:.1}" y="{}" text-anchor="end" transform="rotate(-45 {x:.1} {})">{}</text>"#,
            baseline + 16,
            baseline + 16,
            snapshot.date
        ));
    }

    let counts: Vec<i64> = snapshots.iter().map(|s| s.video_count).collect();
    let minutes: Vec<i64> = snapshots.iter().map(|s| s.total_minutes).collect();
    for (color, ceiling, values) in [
        (COUNT_COLOR, count_ceiling, counts),
        (MINUTES_COLOR, minutes_ceiling, minutes),
    ] {
        let coords: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(index, value)| (plot.x(index), plot.y(*value, ceiling)))
            .collect();
        let points: Vec<String> = coords
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect();

        svg.push_str(&format!(
            r#"<polyline fill="none" stroke="{color}" stroke-width="2" points="{}"/>"#,
            points.join(" ")
        ));
        for (x, y) in coords {
            svg.push_str(&format!(
                r#"<circle cx="{x:.1}" cy="{y:.1}" r="3" fill="{color}"/>"#
            ));
        }
    }

    svg.push_str(&format!(
        r#"<text x="{MARGIN_LEFT}" y="{}" fill="{COUNT_COLOR}">Video count</text><text x="{right}" y="{}" text-anchor="end" fill="{MINUTES_COLOR}">Total minutes</text>"#,
        MARGIN_TOP - 12,
        MARGIN_TOP - 12,
    ));
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn snapshot(date: &str, videos: i64, minutes: i64) -> SnapshotDbModel {
        SnapshotDbModel {
            date: date.to_string(),
            video_count: videos,
            total_minutes: minutes,
            created_at: 0,
        }
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(7, 10)]
    #[case(12, 20)]
    #[case(42, 50)]
    #[case(100, 100)]
    #[case(101, 200)]
    #[case(4321, 5000)]
    fn test_nice_ceiling(#[case] max: i64, #[case] expected: i64) {
        assert_eq!(nice_ceiling(max), expected);
    }

    #[test]
    fn test_both_series_are_drawn() {
        let svg = render_svg(&[
            snapshot("2024-05-01", 10, 100),
            snapshot("2024-05-02", 12, 130),
            snapshot("2024-05-03", 11, 121),
        ]);

        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 6);
        assert!(svg.contains("2024-05-01"));
        assert!(svg.contains("2024-05-03"));
    }

    #[test]
    fn test_single_point_is_centered() {
        let svg = render_svg(&[snapshot("2024-05-01", 3, 42)]);
        let center = format!(r#"cx="{}.0""#, MARGIN_LEFT + (WIDTH - MARGIN_LEFT - MARGIN_RIGHT) / 2);
        assert!(svg.contains(&center));
    }

    #[test]
    fn test_x_labels_are_thinned() {
        let snapshots: Vec<_> = (1..=30)
            .map(|day| snapshot(&format!("2024-04-{day:02}"), day, day * 10))
            .collect();

        let svg = render_svg(&snapshots);

        assert!(svg.matches("rotate(-45").count() <= MAX_X_LABELS);
        assert!(svg.contains("2024-04-01"));
        assert_eq!(svg.matches("<circle").count(), 60);
    }

    #[test]
    fn test_huge_values_do_not_overflow_axis_labels() {
        assert_eq!(nice_ceiling(i64::MAX), i64::MAX);

        let svg = render_svg(&[
            snapshot("2024-05-01", i64::MAX, i64::MAX - 1),
            snapshot("2024-05-02", 0, 0),
        ]);

        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains(&(i64::MAX / Y_TICKS).to_string()));
    }
}
