use chrono::NaiveDate;

use crate::api::{ImageSummary, Livestream, UserRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// Aggregate numbers for the dashboard landing view.
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub total_users: usize,
    pub active_users: usize,
    pub total_posts: usize,
    pub total_livestreams: usize,
    pub active_livestreams: usize,
    pub livestreams_per_day: Vec<DayCount>,
}

impl DashboardStats {
    /// Post summaries carry no timestamp on the wire, so only livestreams get
    /// a per-day series.
    pub fn compute(
        users: &[UserRecord],
        posts: &[ImageSummary],
        streams: &[Livestream],
        today: NaiveDate,
    ) -> Self {
        DashboardStats {
            total_users: users.len(),
            active_users: users.iter().filter(|user| user.is_active()).count(),
            total_posts: posts.len(),
            total_livestreams: streams.len(),
            active_livestreams: streams.iter().filter(|stream| stream.is_active).count(),
            livestreams_per_day: daily_counts(
                streams.iter().map(|stream| stream.started_at.date_naive()),
                today,
                7,
            ),
        }
    }
}

/// Buckets dates into the trailing `days` calendar days ending at `today`,
/// oldest first. Dates outside the window are ignored.
pub fn daily_counts(
    dates: impl Iterator<Item = NaiveDate>,
    today: NaiveDate,
    days: usize,
) -> Vec<DayCount> {
    let mut series: Vec<DayCount> = (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(chrono::Days::new(back as u64)))
        .map(|date| DayCount { date, count: 0 })
        .collect();

    for date in dates {
        if let Some(bucket) = series.iter_mut().find(|bucket| bucket.date == date) {
            bucket.count += 1;
        }
    }

    series
}
