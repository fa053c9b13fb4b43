use chrono::{Datelike, Duration, NaiveDate};

use crate::models::StreakRecord;

#[derive(Debug, Clone)]
pub struct DayCell {
    pub date: NaiveDate,
    pub label: String,
    pub done: bool,
    pub is_today: bool,
    pub can_mark: bool,
}

#[derive(Debug, Clone)]
pub struct WeekView {
    pub week_start: NaiveDate,
    pub days: Vec<DayCell>,
}

/// Builds the Monday-to-Sunday week containing `today`.
///
/// Completed days are reconstructed by counting `current_streak` days back
/// from the last completion; only the current run is known, so earlier runs
/// in the same week show as pending.
pub fn week_view(record: &StreakRecord, today: NaiveDate) -> WeekView {
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let days = (0..7)
        .map(|offset| {
            let date = week_start + Duration::days(offset);
            let done = is_in_current_run(record, date);
            let is_today = date == today;
            DayCell {
                date,
                label: date.format("%a").to_string(),
                done,
                is_today,
                can_mark: is_today && !done,
            }
        })
        .collect();

    WeekView { week_start, days }
}

fn is_in_current_run(record: &StreakRecord, date: NaiveDate) -> bool {
    match record.last_completed_date {
        Some(last) if record.current_streak > 0 && date <= last => {
            (last - date).num_days() < i64::from(record.current_streak)
        }
        _ => false,
    }
}

pub fn render_week(title: &str, view: &WeekView) -> String {
    let mut output = String::new();
    output.push_str(&format!("{title} (week of {})\n", view.week_start));

    for day in &view.days {
        let status = if day.done { "Done" } else { "Pending" };
        let marker = if day.is_today { "  <- today" } else { "" };
        output.push_str(&format!(
            "  {} {}  {:<7}{}\n",
            day.label, day.date, status, marker
        ));
    }

    if view.days.iter().any(|day| day.can_mark) {
        output.push_str("\nToday is still open: run `done` to mark it.\n");
    }

    output
}
