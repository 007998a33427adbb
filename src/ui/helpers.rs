use anyhow::Error;
use chrono::{NaiveDate, Weekday};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

use crate::models::{RatingValue, ThemeMode};

/// Colours for the chosen theme. `System` leaves the terminal's own colours
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Palette {
    pub(crate) background: Color,
    pub(crate) text: Color,
    pub(crate) accent: Color,
    pub(crate) muted: Color,
}

impl Palette {
    pub(crate) fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::System => Self {
                background: Color::Reset,
                text: Color::Reset,
                accent: Color::Cyan,
                muted: Color::DarkGray,
            },
            ThemeMode::Light => Self {
                background: Color::White,
                text: Color::Black,
                accent: Color::Blue,
                muted: Color::Gray,
            },
            ThemeMode::Dark => Self {
                background: Color::Black,
                text: Color::White,
                accent: Color::LightCyan,
                muted: Color::DarkGray,
            },
        }
    }

    pub(crate) fn base(&self) -> Style {
        Style::default().bg(self.background).fg(self.text)
    }

    pub(crate) fn key(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub(crate) fn dim(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub(crate) fn highlight(&self) -> Style {
        Style::default()
            .fg(self.accent)
            .add_modifier(Modifier::BOLD | Modifier::REVERSED)
    }
}

/// Heat-map colour for a rating; unrated days stay grey.
pub(crate) fn rating_color(value: Option<RatingValue>) -> Color {
    match value {
        Some(RatingValue::Positive) => Color::Green,
        Some(RatingValue::Neutral) => Color::Yellow,
        Some(RatingValue::Negative) => Color::Red,
        None => Color::DarkGray,
    }
}

/// Emoji plus label for a rating, or a dim placeholder.
pub(crate) fn rating_span(value: Option<RatingValue>) -> Span<'static> {
    match value {
        Some(value) => Span::styled(value.to_string(), Style::default().fg(rating_color(Some(value)))),
        None => Span::styled("·  not rated", Style::default().fg(Color::DarkGray)),
    }
}

/// Horizontal bar for a 0.0..=1.0 fraction.
pub(crate) fn progress_bar(fraction: f32, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f32).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled.min(width)))
}

/// Bar for an average score between 1.0 and 3.0.
pub(crate) fn score_bar(score: f32, width: usize) -> String {
    progress_bar((score - 1.0) / 2.0, width)
}

/// One column of the trend chart; taller for better days.
pub(crate) fn trend_glyph(value: RatingValue) -> &'static str {
    match value {
        RatingValue::Negative => "▂",
        RatingValue::Neutral => "▅",
        RatingValue::Positive => "█",
    }
}

pub(crate) fn weekday_short(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// `Mon 2024-05-13`.
pub(crate) fn format_day(date: NaiveDate) -> String {
    date.format("%a %Y-%m-%d").to_string()
}

/// Move `current` by `offset` inside `0..len`, clamping at both ends.
pub(crate) fn step_index(current: usize, len: usize, offset: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let next = current as isize + offset;
    next.clamp(0, len as isize - 1) as usize
}

/// Produce a rectangle centered within `area` that spans the requested percent
/// of the width and height. Used for modal dialogs.
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(area);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(horizontal[1]);

    vertical[1]
}

/// Extract the most relevant error message from a chained error.
pub(crate) fn surface_error(err: &Error) -> String {
    err.chain()
        .last()
        .map(|cause| cause.to_string())
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn progress_bar_fills_proportionally() {
        assert_eq!(progress_bar(0.0, 4), "░░░░");
        assert_eq!(progress_bar(0.5, 4), "██░░");
        assert_eq!(progress_bar(2.0, 4), "████");
        assert_eq!(score_bar(3.0, 2), "██");
        assert_eq!(score_bar(1.0, 2), "░░");
    }

    #[test]
    fn step_index_clamps() {
        assert_eq!(step_index(0, 3, -1), 0);
        assert_eq!(step_index(1, 3, 5), 2);
        assert_eq!(step_index(4, 0, 1), 0);
    }

    #[test]
    fn surface_error_prefers_root_cause() {
        let err = Err::<(), _>(anyhow::anyhow!("Name is required."))
            .context("failed to save")
            .unwrap_err();
        assert_eq!(surface_error(&err), "Name is required.");
    }
}
