//! Aggregations behind the insights screens. Everything here is a pure
//! function over rows already loaded from the database; "today" is always
//! passed in so results are reproducible in tests.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Datelike, Days, NaiveDate, Weekday};

pub use crate::calendar::week_start;

use crate::calendar::{days_in_month, start_offset};
use crate::error::StoreError;
use crate::models::{Category, DatedRating, RatingValue, RatingWithCategory};

/// Distinct rated days needed before the insights hub shows real numbers.
pub const MIN_DAYS_FOR_INSIGHTS: i64 = 4;
pub const DAYS_PER_WEEK: u32 = 7;

/// Label used when a rating points at a category we cannot resolve.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

fn mean(values: impl IntoIterator<Item = RatingValue>) -> Option<f32> {
    let (sum, count) = values
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), value| {
            (sum + u32::from(value.score()), count + 1)
        });
    (count > 0).then(|| sum as f32 / count as f32)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Count of ratings per value.
pub struct RatingDistribution {
    pub positive: u32,
    pub neutral: u32,
    pub negative: u32,
}

impl RatingDistribution {
    pub fn from_values(values: impl IntoIterator<Item = RatingValue>) -> Self {
        let mut distribution = Self::default();
        for value in values {
            distribution.add(value, 1);
        }
        distribution
    }

    pub fn add(&mut self, value: RatingValue, count: u32) {
        match value {
            RatingValue::Positive => self.positive += count,
            RatingValue::Neutral => self.neutral += count,
            RatingValue::Negative => self.negative += count,
        }
    }

    pub fn count(&self, value: RatingValue) -> u32 {
        match value {
            RatingValue::Positive => self.positive,
            RatingValue::Neutral => self.neutral,
            RatingValue::Negative => self.negative,
        }
    }

    pub fn total(&self) -> u32 {
        self.positive + self.neutral + self.negative
    }

    /// Share of `value` in percent; 0 for an empty distribution.
    pub fn percent(&self, value: RatingValue) -> f32 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.count(value) as f32 / total as f32 * 100.0
        }
    }

    pub fn positive_percent(&self) -> f32 {
        self.percent(RatingValue::Positive)
    }

    pub fn neutral_percent(&self) -> f32 {
        self.percent(RatingValue::Neutral)
    }

    pub fn negative_percent(&self) -> f32 {
        self.percent(RatingValue::Negative)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// One category's counts over a period.
pub struct CategorySummary {
    pub category_id: i64,
    pub category_name: String,
    pub counts: RatingDistribution,
}

impl CategorySummary {
    pub fn total(&self) -> u32 {
        self.counts.total()
    }

    pub fn average_score(&self) -> Option<f32> {
        let total = self.total();
        if total == 0 {
            return None;
        }
        let weighted = self.counts.negative + self.counts.neutral * 2 + self.counts.positive * 3;
        Some(weighted as f32 / total as f32)
    }

    /// Most frequent rating. Ties resolve toward the happier value.
    pub fn dominant_rating(&self) -> Option<RatingValue> {
        let RatingDistribution {
            positive,
            neutral,
            negative,
        } = self.counts;
        if self.total() == 0 {
            None
        } else if positive >= neutral && positive >= negative {
            Some(RatingValue::Positive)
        } else if neutral >= negative {
            Some(RatingValue::Neutral)
        } else {
            Some(RatingValue::Negative)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeeklySummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub category_summaries: Vec<CategorySummary>,
    pub days_rated: u32,
}

impl WeeklySummary {
    /// Fraction (0.0 to 1.0) of the week's days that have any rating.
    pub fn completion(&self) -> f32 {
        self.days_rated as f32 / DAYS_PER_WEEK as f32
    }
}

/// Last day of the week starting at `week_start`.
pub fn week_end(week_start: NaiveDate) -> NaiveDate {
    week_start + Days::new(u64::from(DAYS_PER_WEEK - 1))
}

/// Roll the ratings of one week up per category. `ratings` should already be
/// limited to the week and sorted the way categories should be listed.
pub fn build_weekly_summary(week_start: NaiveDate, ratings: &[RatingWithCategory]) -> WeeklySummary {
    let end_date = week_end(week_start);
    let mut summaries: Vec<CategorySummary> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for rating in ratings {
        let (Some(category_id), Some(name)) = (rating.category_id, rating.category_name.as_ref())
        else {
            continue;
        };
        let slot = *index.entry(category_id).or_insert_with(|| {
            summaries.push(CategorySummary {
                category_id,
                category_name: name.clone(),
                counts: RatingDistribution::default(),
            });
            summaries.len() - 1
        });
        summaries[slot].counts.add(rating.value, 1);
    }

    let mut days: Vec<NaiveDate> = ratings.iter().map(|r| r.date).collect();
    days.sort_unstable();
    days.dedup();

    WeeklySummary {
        start_date: week_start,
        end_date,
        category_summaries: summaries,
        days_rated: days.len() as u32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A single day cell in the heat map or weekly breakdown.
pub struct DayIndicator {
    pub date: NaiveDate,
    /// `None` when the day has no rating for the tracked category.
    pub overall_rating: Option<RatingValue>,
    pub ratings_count: u32,
    pub total_categories: u32,
}

impl DayIndicator {
    pub fn is_complete(&self) -> bool {
        self.total_categories > 0 && self.ratings_count == self.total_categories
    }
}

/// Seven indicators (one per day starting at `week_start`) for one category.
pub fn category_week_breakdown(
    category_id: i64,
    week_start: NaiveDate,
    ratings: &[RatingWithCategory],
    total_categories: u32,
) -> Vec<DayIndicator> {
    (0..DAYS_PER_WEEK)
        .map(|offset| {
            let date = week_start + Days::new(u64::from(offset));
            let overall_rating = ratings
                .iter()
                .find(|r| r.date == date && r.category_id == Some(category_id))
                .map(|r| r.value);
            let ratings_count = ratings.iter().filter(|r| r.date == date).count() as u32;
            DayIndicator {
                date,
                overall_rating,
                ratings_count,
                total_categories,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCalendar {
    pub year: i32,
    pub month: u32,
    /// One indicator per day of the month, day 1 first.
    pub days: Vec<DayIndicator>,
    pub first_weekday: Weekday,
}

impl MonthlyCalendar {
    pub fn days_in_month(&self) -> u32 {
        self.days.len() as u32
    }

    /// Empty grid cells before day 1 when rows start at `first_weekday`.
    pub fn start_offset(&self) -> u32 {
        self.days
            .first()
            .map(|day| start_offset(day.date, self.first_weekday))
            .unwrap_or(0)
    }

    pub fn day(&self, day_of_month: u32) -> Option<&DayIndicator> {
        day_of_month
            .checked_sub(1)
            .and_then(|idx| self.days.get(idx as usize))
    }
}

/// Heat map data for one month. `overall` holds the "Overall Day" ratings
/// (first one per date wins), `all` every rating in the month.
pub fn build_monthly_calendar(
    year: i32,
    month: u32,
    overall: &[DatedRating],
    all: &[RatingWithCategory],
    total_categories: u32,
    first_weekday: Weekday,
) -> Result<MonthlyCalendar, StoreError> {
    let length = days_in_month(year, month)?;

    let mut overall_by_date: HashMap<NaiveDate, RatingValue> = HashMap::new();
    for rating in overall {
        overall_by_date.entry(rating.date).or_insert(rating.value);
    }
    let mut counts: HashMap<NaiveDate, u32> = HashMap::new();
    for rating in all {
        *counts.entry(rating.date).or_default() += 1;
    }

    let days = (1..=length)
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| DayIndicator {
            date,
            overall_rating: overall_by_date.get(&date).copied(),
            ratings_count: counts.get(&date).copied().unwrap_or(0),
            total_categories,
        })
        .collect();

    Ok(MonthlyCalendar {
        year,
        month,
        days,
        first_weekday,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Window shown by the trend chart.
pub enum TrendRange {
    Week,
    Month,
    ThreeMonths,
    Year,
    AllTime,
}

impl TrendRange {
    pub const ALL: [TrendRange; 5] = [
        TrendRange::Week,
        TrendRange::Month,
        TrendRange::ThreeMonths,
        TrendRange::Year,
        TrendRange::AllTime,
    ];

    /// Length of the window in days; `None` means no limit.
    pub fn days(self) -> Option<u64> {
        match self {
            TrendRange::Week => Some(7),
            TrendRange::Month => Some(30),
            TrendRange::ThreeMonths => Some(90),
            TrendRange::Year => Some(365),
            TrendRange::AllTime => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrendRange::Week => "1 Week",
            TrendRange::Month => "1 Month",
            TrendRange::ThreeMonths => "3 Months",
            TrendRange::Year => "1 Year",
            TrendRange::AllTime => "All Time",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendData {
    pub category_id: i64,
    pub category_name: String,
    pub range: TrendRange,
    pub points: Vec<DatedRating>,
}

impl TrendData {
    pub fn average_score(&self) -> Option<f32> {
        mean(self.points.iter().map(|p| p.value))
    }

    pub fn rated_days(&self) -> usize {
        self.points
            .iter()
            .map(|p| p.date)
            .collect::<BTreeSet<NaiveDate>>()
            .len()
    }
}

/// Clip a category's history to the requested window ending today.
pub fn build_trend(
    category_id: i64,
    category_name: &str,
    range: TrendRange,
    history: &[DatedRating],
    today: NaiveDate,
) -> TrendData {
    let start = match range.days() {
        Some(days) => today - Days::new(days),
        None => history.iter().map(|p| p.date).min().unwrap_or(today),
    };

    let points = history
        .iter()
        .filter(|p| p.date >= start && p.date <= today)
        .copied()
        .collect();

    TrendData {
        category_id,
        category_name: category_name.to_string(),
        range,
        points,
    }
}

/// Current and longest streaks of consecutive rated days.
///
/// The current streak counts back from `today` and is 0 when today has no
/// rating. Dates after `today` are ignored for both numbers.
pub fn calculate_streaks(rated_dates: &[NaiveDate], today: NaiveDate) -> (u32, u32) {
    let mut dates: Vec<NaiveDate> = rated_dates.iter().copied().filter(|d| *d <= today).collect();
    if dates.is_empty() {
        return (0, 0);
    }
    dates.sort_unstable_by(|a, b| b.cmp(a));
    dates.dedup();

    let mut current = 0;
    let mut expected = Some(today);
    for date in &dates {
        if Some(*date) != expected {
            break;
        }
        current += 1;
        expected = date.pred_opt();
    }

    let mut longest = 1;
    let mut run = 1;
    for pair in dates.windows(2) {
        if pair[0].pred_opt() == Some(pair[1]) {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 1;
        }
    }

    (current, longest)
}

pub fn current_streak(rated_dates: &[NaiveDate], today: NaiveDate) -> u32 {
    calculate_streaks(rated_dates, today).0
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryAverage {
    pub category_id: i64,
    pub category_name: String,
    /// Between 1.0 and 3.0.
    pub average_score: f32,
    pub total_ratings: u32,
}

/// Mean score per category. Ratings without a category are skipped; a
/// category missing from `names` is reported as "Unknown".
pub fn category_averages(
    ratings: &[RatingWithCategory],
    names: &HashMap<i64, String>,
) -> BTreeMap<i64, CategoryAverage> {
    let mut grouped: BTreeMap<i64, Vec<RatingValue>> = BTreeMap::new();
    for rating in ratings {
        if let Some(category_id) = rating.category_id {
            grouped.entry(category_id).or_default().push(rating.value);
        }
    }

    grouped
        .into_iter()
        .filter_map(|(category_id, values)| {
            let total_ratings = values.len() as u32;
            let average_score = mean(values)?;
            let category_name = names
                .get(&category_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            Some((
                category_id,
                CategoryAverage {
                    category_id,
                    category_name,
                    average_score,
                    total_ratings,
                },
            ))
        })
        .collect()
}

/// Mean score per weekday, Monday first. Days without ratings are omitted.
pub fn day_of_week_averages(ratings: &[RatingWithCategory]) -> Vec<(Weekday, f32)> {
    let mut grouped: [Vec<RatingValue>; 7] = Default::default();
    for rating in ratings {
        grouped[rating.date.weekday().num_days_from_monday() as usize].push(rating.value);
    }

    let mut weekday = Weekday::Mon;
    let mut averages = Vec::new();
    for values in grouped {
        if let Some(average) = mean(values) {
            averages.push((weekday, average));
        }
        weekday = weekday.succ();
    }
    averages
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserStatistics {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_days_rated: u32,
    pub first_rating_date: Option<NaiveDate>,
    pub category_averages: BTreeMap<i64, CategoryAverage>,
    pub day_of_week_averages: Vec<(Weekday, f32)>,
    pub distribution: RatingDistribution,
}

/// Everything the statistics screen shows, computed in one pass.
pub fn build_statistics(
    rated_dates: &[NaiveDate],
    distribution: RatingDistribution,
    ratings: &[RatingWithCategory],
    categories: &[Category],
    today: NaiveDate,
) -> UserStatistics {
    let (current_streak, longest_streak) = calculate_streaks(rated_dates, today);
    let names: HashMap<i64, String> = categories
        .iter()
        .map(|c| (c.id, c.name.clone()))
        .collect();

    let mut distinct = rated_dates.to_vec();
    distinct.sort_unstable();
    distinct.dedup();

    UserStatistics {
        current_streak,
        longest_streak,
        total_days_rated: distinct.len() as u32,
        first_rating_date: distinct.first().copied(),
        category_averages: category_averages(ratings, &names),
        day_of_week_averages: day_of_week_averages(ratings),
        distribution,
    }
}

pub fn has_minimum_data(rated_days: i64) -> bool {
    rated_days >= MIN_DAYS_FOR_INSIGHTS
}
