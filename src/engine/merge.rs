use std::collections::HashMap;

use chrono::NaiveDate;

use crate::models::daily_log::{day_start, DailyLog};

/// Fold `logs` into at most one entry per calendar date.
///
/// Entries keep the order in which their date first appears. Same-date
/// entries are absorbed into the first one, and every surviving entry is
/// stamped at midnight UTC of its day.
pub fn merge_by_date<I>(logs: I) -> Vec<DailyLog>
where
    I: IntoIterator<Item = DailyLog>,
{
    let mut merged: Vec<DailyLog> = Vec::new();
    let mut index: HashMap<NaiveDate, usize> = HashMap::new();

    for log in logs {
        let day = log.day();
        match index.get(&day) {
            Some(&i) => merged[i].absorb(log),
            None => {
                index.insert(day, merged.len());
                merged.push(DailyLog {
                    date: day_start(day),
                    ..log
                });
            }
        }
    }

    merged
}
