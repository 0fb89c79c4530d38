use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::task::Task;
use crate::config::TimelineConfig;

/// Controls what scale the timeline displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineScale {
    Day,
    Week,
    Biweekly,
    Month,
    Quarter,
}

/// Direction used when snapping a date onto a unit boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Floor,
    Ceil,
}

impl TimelineScale {
    pub const ALL: [TimelineScale; 5] = [
        TimelineScale::Day,
        TimelineScale::Week,
        TimelineScale::Biweekly,
        TimelineScale::Month,
        TimelineScale::Quarter,
    ];

    /// Pixels per day at zoom 1.0.
    pub fn base_pixels_per_day(self) -> f32 {
        match self {
            TimelineScale::Day => 40.0,
            TimelineScale::Week => 18.0,
            TimelineScale::Biweekly => 9.0,
            TimelineScale::Month => 4.0,
            TimelineScale::Quarter => 1.5,
        }
    }

    /// Unit length for the scales whose units never vary.
    fn fixed_unit_days(self) -> Option<i64> {
        match self {
            TimelineScale::Day => Some(1),
            TimelineScale::Week => Some(7),
            TimelineScale::Biweekly => Some(14),
            TimelineScale::Month | TimelineScale::Quarter => None,
        }
    }

    /// First day of the unit containing `date`.
    pub fn unit_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            TimelineScale::Day => date,
            TimelineScale::Week => {
                let weekday = date.weekday().num_days_from_monday();
                shift_days(date, -(weekday as i64))
            }
            TimelineScale::Biweekly => {
                let epoch = biweekly_epoch();
                let elapsed = (date - epoch).num_days();
                shift_days(epoch, elapsed.div_euclid(14) * 14)
            }
            TimelineScale::Month => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
            }
            TimelineScale::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
            }
        }
    }

    /// Start of the unit following the one containing `date`.
    pub fn next_unit(self, date: NaiveDate) -> NaiveDate {
        let start = self.unit_start(date);
        let next = match self {
            TimelineScale::Day => start.checked_add_days(Days::new(1)),
            TimelineScale::Week => start.checked_add_days(Days::new(7)),
            TimelineScale::Biweekly => start.checked_add_days(Days::new(14)),
            TimelineScale::Month => start.checked_add_months(Months::new(1)),
            TimelineScale::Quarter => start.checked_add_months(Months::new(3)),
        };
        next.unwrap_or(NaiveDate::MAX)
    }

    /// Snap a date down or up onto the nearest unit boundary.
    pub fn normalize(self, date: NaiveDate, bound: Bound) -> NaiveDate {
        let floor = self.unit_start(date);
        match bound {
            Bound::Floor => floor,
            Bound::Ceil if floor == date => date,
            Bound::Ceil => self.next_unit(floor),
        }
    }

    /// Header label for the unit starting at `date`.
    pub fn unit_label(self, date: NaiveDate) -> String {
        match self {
            TimelineScale::Day => date.format("%d").to_string(),
            TimelineScale::Week | TimelineScale::Biweekly => date.format("W%V").to_string(),
            TimelineScale::Month => date.format("%b %Y").to_string(),
            TimelineScale::Quarter => format!("Q{} {}", date.month0() / 3 + 1, date.year()),
        }
    }

    /// Upper header label, shown on the first unit of each month.
    fn group_label(self, date: NaiveDate) -> Option<String> {
        match self {
            TimelineScale::Day if date.day() == 1 => Some(date.format("%b %Y").to_string()),
            TimelineScale::Week | TimelineScale::Biweekly if date.day() <= 7 => {
                Some(date.format("%b %Y").to_string())
            }
            TimelineScale::Quarter if date.month() == 1 => Some(date.year().to_string()),
            _ => None,
        }
    }
}

fn biweekly_epoch() -> NaiveDate {
    // 1970-01-05 is the first Monday of the Unix epoch.
    NaiveDate::from_ymd_opt(1970, 1, 5).unwrap_or(NaiveDate::MIN)
}

/// Shift a date by a signed number of days, saturating at the calendar limits.
pub fn shift_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Convert a date to an x-pixel offset from `view_start`.
pub fn date_to_x(
    date: NaiveDate,
    view_start: NaiveDate,
    scale: TimelineScale,
    pixels_per_day: f32,
) -> f32 {
    let ppd = pixels_per_day as f64;
    let x = match scale.fixed_unit_days() {
        Some(unit_days) => {
            let elapsed = (date - view_start).num_days();
            let units = elapsed.div_euclid(unit_days);
            let remainder = elapsed.rem_euclid(unit_days);
            units as f64 * (unit_days as f64 * ppd) + remainder as f64 * ppd
        }
        None => {
            // Months and quarters differ in length, so the offset is the real
            // day count of every unit before this one plus the days into it.
            let unit = scale.unit_start(date);
            let preceding = (unit - view_start).num_days();
            let within = (date - unit).num_days();
            preceding as f64 * ppd + within as f64 * ppd
        }
    };
    x as f32
}

/// Convert an x-pixel offset back to a date, rounding to the nearest day.
pub fn x_to_date(
    x: f32,
    view_start: NaiveDate,
    scale: TimelineScale,
    pixels_per_day: f32,
) -> NaiveDate {
    if !x.is_finite() || pixels_per_day <= 0.0 {
        return view_start;
    }
    let days = x as f64 / pixels_per_day as f64;
    match scale.fixed_unit_days() {
        Some(unit_days) => {
            let units = (days / unit_days as f64).floor();
            let remainder = (days - units * unit_days as f64).round() as i64;
            let unit_start = shift_days(view_start, (units as i64).saturating_mul(unit_days));
            shift_days(unit_start, remainder)
        }
        None => {
            let approx = shift_days(view_start, days.floor() as i64);
            let unit = scale.unit_start(approx);
            let preceding = (unit - view_start).num_days() as f64;
            shift_days(unit, (days - preceding).round() as i64)
        }
    }
}

/// Width in pixels of the span `[start, end)`.
pub fn bar_width(
    start: NaiveDate,
    end: NaiveDate,
    view_start: NaiveDate,
    scale: TimelineScale,
    pixels_per_day: f32,
) -> f32 {
    date_to_x(end, view_start, scale, pixels_per_day)
        - date_to_x(start, view_start, scale, pixels_per_day)
}

/// The `[start, end)` date range a layout is computed against, aligned to
/// unit boundaries of its scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ViewWindow {
    pub fn new(start: NaiveDate, end: NaiveDate, scale: TimelineScale) -> Self {
        let (start, end) = if end < start { (end, start) } else { (start, end) };
        let start = scale.normalize(start, Bound::Floor);
        let mut end = scale.normalize(end, Bound::Ceil);
        if end <= start {
            end = scale.next_unit(start);
        }
        Self { start, end }
    }

    /// Window framing every task, padded on both sides. Falls back to
    /// `fallback` when there are no tasks.
    pub fn fit(tasks: &[Task], scale: TimelineScale, padding_days: i64, fallback: NaiveDate) -> Self {
        let start = tasks.iter().map(|t| t.start).min().unwrap_or(fallback);
        let end = tasks.iter().map(|t| t.finish()).max().unwrap_or(fallback);
        Self::new(
            shift_days(start, -padding_days),
            shift_days(end, padding_days),
            scale,
        )
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// One header/grid tick on a unit boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineTick {
    pub date: NaiveDate,
    pub x: f32,
    pub label: String,
    pub group_label: Option<String>,
}

/// Manages the visible viewport of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimelineViewport {
    pub window: ViewWindow,
    /// Current display scale.
    pub scale: TimelineScale,
    /// Multiplier on the scale's base pixels per day.
    pub zoom: f32,
}

impl TimelineViewport {
    pub fn new(start: NaiveDate, end: NaiveDate, scale: TimelineScale) -> Self {
        Self {
            window: ViewWindow::new(start, end, scale),
            scale,
            zoom: 1.0,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.window.start
    }

    pub fn pixels_per_day(&self) -> f32 {
        self.scale.base_pixels_per_day() * self.zoom
    }

    /// Convert a date to an x-pixel offset from the viewport start.
    pub fn date_to_x(&self, date: NaiveDate) -> f32 {
        date_to_x(date, self.window.start, self.scale, self.pixels_per_day())
    }

    /// Convert an x-pixel offset back to a date.
    pub fn x_to_date(&self, x: f32) -> NaiveDate {
        x_to_date(x, self.window.start, self.scale, self.pixels_per_day())
    }

    pub fn bar_width(&self, start: NaiveDate, end: NaiveDate) -> f32 {
        bar_width(start, end, self.window.start, self.scale, self.pixels_per_day())
    }

    /// Total width in pixels for the visible range.
    pub fn total_width(&self) -> f32 {
        self.date_to_x(self.window.end)
    }

    /// Zoom in (increase pixels per day).
    pub fn zoom_in(&mut self, config: &TimelineConfig) {
        self.zoom = (self.zoom * config.zoom_step).min(config.zoom_max);
    }

    /// Zoom out (decrease pixels per day).
    pub fn zoom_out(&mut self, config: &TimelineConfig) {
        self.zoom = (self.zoom / config.zoom_step).max(config.zoom_min);
    }

    /// Switch scale, re-aligning the window to the new unit boundaries.
    pub fn set_scale(&mut self, scale: TimelineScale) {
        self.scale = scale;
        self.window = ViewWindow::new(self.window.start, self.window.end, scale);
    }

    /// Scroll the viewport by a number of days.
    pub fn scroll_days(&mut self, days: i64) {
        self.window = ViewWindow::new(
            shift_days(self.window.start, days),
            shift_days(self.window.end, days),
            self.scale,
        );
    }

    /// Unit boundaries inside the window, for header labels and grid lines.
    pub fn ticks(&self) -> Vec<TimelineTick> {
        let mut ticks = Vec::new();
        let mut date = self.window.start;
        while date < self.window.end {
            ticks.push(TimelineTick {
                date,
                x: self.date_to_x(date),
                label: self.scale.unit_label(date),
                group_label: self.scale.group_label(date),
            });
            let next = self.scale.next_unit(date);
            if next <= date {
                break;
            }
            date = next;
        }
        ticks
    }

    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.window.hash(&mut hasher);
        self.scale.hash(&mut hasher);
        self.zoom.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}
