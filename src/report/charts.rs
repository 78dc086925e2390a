//! SVG rendering of the report charts.

use std::fmt::Display;
use std::path::Path;

use plotters::prelude::*;

use crate::error::{PipelineError, Result};
use crate::models::{StatusCounts, WeeklyUsers};
use crate::report::analysis::Bin;

const SIZE: (u32, u32) = (1024, 600);
const CAPTION_FONT: (&str, u32) = ("sans-serif", 24);

fn chart_err<E: Display>(err: E) -> PipelineError {
    PipelineError::Chart(err.to_string())
}

fn headroom(max: usize) -> usize {
    max + max / 10 + 1
}

/// Line chart of total and active users per week
pub fn render_user_trends(trends: &[WeeklyUsers], path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let y_max = trends
        .iter()
        .map(|w| w.total_users.max(w.active_users))
        .max()
        .unwrap_or(0);
    let x_max = trends.len().saturating_sub(1).max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Total and Active Users Over Time", CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0_usize..x_max, 0_usize..headroom(y_max))
        .map_err(chart_err)?;

    let week_label = |index: &usize| trends.get(*index).map(|w| w.week.to_string()).unwrap_or_default();
    chart
        .configure_mesh()
        .x_labels(trends.len().clamp(2, 12))
        .x_label_formatter(&week_label)
        .x_desc("week")
        .y_desc("users")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(LineSeries::new(
            trends.iter().enumerate().map(|(i, w)| (i, w.total_users)),
            &BLUE,
        ))
        .map_err(chart_err)?
        .label("total_users")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

    chart
        .draw_series(LineSeries::new(
            trends.iter().enumerate().map(|(i, w)| (i, w.active_users)),
            &RED,
        ))
        .map_err(chart_err)?
        .label("active_users")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Histogram of seconds from send to read
pub fn render_time_to_read(bins: &[Bin], path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let x_min = bins.first().map_or(0.0, |b| b.start);
    let x_max = bins.last().map_or(1.0, |b| b.end);
    let y_max = bins.iter().map(|b| b.count).max().unwrap_or(0);

    let mut chart = ChartBuilder::on(&root)
        .caption("Distribution of Time to Read Outbound Messages (Seconds)", CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0.0..headroom(y_max) as f64)
        .map_err(chart_err)?;

    chart
        .configure_mesh()
        .x_desc("time_to_read_seconds")
        .y_desc("count")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(bins.iter().map(|b| {
            Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], BLUE.mix(0.6).filled())
        }))
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

/// Bar chart of outbound statuses in the last week of data
pub fn render_status_counts(counts: &StatusCounts, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_err)?;

    let bars = counts.bars();
    let y_max = bars.iter().map(|(_, c)| *c).max().unwrap_or(0);
    let to_u32 = |v: usize| u32::try_from(v).unwrap_or(u32::MAX);

    let mut chart = ChartBuilder::on(&root)
        .caption("Outbound Message Statuses in the Last Week", CAPTION_FONT)
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((0_u32..4_u32).into_segmented(), 0_u32..to_u32(headroom(y_max)))
        .map_err(chart_err)?;

    let status_label = |value: &SegmentValue<u32>| match value {
        SegmentValue::CenterOf(i) => bars
            .get(*i as usize)
            .map(|(label, _)| (*label).to_string())
            .unwrap_or_default(),
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&status_label)
        .x_desc("status")
        .y_desc("count")
        .draw()
        .map_err(chart_err)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(BLUE.mix(0.6).filled())
                .margin(20)
                .data(bars.iter().enumerate().map(|(i, (_, c))| (to_u32(i), to_u32(*c)))),
        )
        .map_err(chart_err)?;

    root.present().map_err(chart_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn test_render_user_trends_writes_svg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user_trends.svg");
        let week = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let trends = vec![
            WeeklyUsers {
                week,
                total_users: 5,
                active_users: 2,
            },
            WeeklyUsers {
                week: week + chrono::Duration::days(7),
                total_users: 7,
                active_users: 0,
            },
        ];

        render_user_trends(&trends, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Total and Active Users Over Time"));
    }

    #[test]
    fn test_render_status_counts_writes_svg() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("statuses.svg");
        let counts = StatusCounts {
            sent: 4,
            delivered: 3,
            read: 2,
            failed: 1,
        };

        render_status_counts(&counts, &path).unwrap();
        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("delivered"));
    }
}
