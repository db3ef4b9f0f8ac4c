//! Terminal price charts

use analyst_core::PriceHistory;

const BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const ASCII_LEVELS: [char; 8] = ['_', '.', '-', '~', '=', '+', '*', '#'];

/// Average `values` into at most `width` evenly sized buckets
pub fn downsample(values: &[f64], width: usize) -> Vec<f64> {
    if width == 0 || values.is_empty() {
        return Vec::new();
    }
    if values.len() <= width {
        return values.to_vec();
    }

    (0..width)
        .map(|i| {
            let start = i * values.len() / width;
            let end = ((i + 1) * values.len() / width).max(start + 1);
            let bucket = &values[start..end];
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
        .collect()
}

/// One glyph per bucket, scaled between the series min and max
pub fn sparkline(values: &[f64], width: usize, unicode: bool) -> String {
    let levels = if unicode { &BLOCKS } else { &ASCII_LEVELS };
    let samples = downsample(values, width);

    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = max - min;

    samples
        .iter()
        .map(|&v| {
            if span <= f64::EPSILON {
                levels[levels.len() / 2]
            } else {
                let idx = ((v - min) / span * (levels.len() - 1) as f64).round() as usize;
                levels[idx.min(levels.len() - 1)]
            }
        })
        .collect()
}

/// Titled sparkline with the period's first, last, low and high closes
pub fn render_chart(label: &str, history: &PriceHistory, width: usize, unicode: bool) -> String {
    let (first, last) = match (history.first(), history.latest()) {
        (Some(first), Some(last)) => (first, last),
        _ => return format!("{} ({})\n  no data", label, history.symbol),
    };

    let min = history.min().unwrap_or(last.close);
    let max = history.max().unwrap_or(last.close);
    let change = if first.close.abs() > f64::EPSILON {
        (last.close - first.close) / first.close * 100.0
    } else {
        0.0
    };
    let arrow = if unicode { "→" } else { "->" };

    format!(
        "{} ({})\n  {}\n  {} {:.2} {} {} {:.2}  low {:.2}  high {:.2}  change {:+.1}%",
        label,
        history.symbol,
        sparkline(&history.closes(), width, unicode),
        first.date,
        first.close,
        arrow,
        last.date,
        last.close,
        min,
        max,
        change
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use analyst_core::PricePoint;
    use chrono::NaiveDate;

    fn history(closes: &[f64]) -> PriceHistory {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceHistory {
            symbol: "AAPL".into(),
            points: closes
                .iter()
                .enumerate()
                .map(|(i, &close)| PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    close,
                })
                .collect(),
        }
    }

    #[test]
    fn test_downsample_averages_buckets() {
        assert_eq!(downsample(&[1.0, 3.0, 5.0, 7.0], 2), vec![2.0, 6.0]);
        assert_eq!(downsample(&[1.0, 2.0], 10), vec![1.0, 2.0]);
        assert!(downsample(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_sparkline_spans_levels() {
        assert_eq!(sparkline(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 8, true), "▁▂▃▄▅▆▇█");
        assert_eq!(sparkline(&[0.0, 10.0], 2, false), "_#");
    }

    #[test]
    fn test_sparkline_flat_series() {
        assert_eq!(sparkline(&[5.0, 5.0, 5.0], 3, true), "▅▅▅");
        assert_eq!(sparkline(&[], 10, true), "");
    }

    #[test]
    fn test_render_chart_summary() {
        let rendered = render_chart("Apple", &history(&[100.0, 90.0, 110.0]), 10, false);
        assert!(rendered.starts_with("Apple (AAPL)\n"));
        assert!(rendered.contains("2024-01-01 100.00 -> 2024-01-03 110.00"));
        assert!(rendered.contains("low 90.00"));
        assert!(rendered.contains("high 110.00"));
        assert!(rendered.contains("change +10.0%"));
    }

    #[test]
    fn test_render_chart_without_data() {
        let rendered = render_chart("Apple", &history(&[]), 10, true);
        assert!(rendered.ends_with("no data"));
    }
}
