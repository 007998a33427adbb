use std::collections::HashMap;

use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};
use rusqlite::Connection;

use crate::calendar::{month_bounds, shift_month, week_start, DEFAULT_FIRST_WEEKDAY};
use crate::db::{
    count_rated_days, fetch_active_categories, fetch_active_members, fetch_all_day_ratings,
    fetch_category_history, fetch_day_ratings, fetch_overall_ratings_in_range, fetch_rated_dates,
    fetch_rated_dates_in_month, fetch_rating_distribution, fetch_ratings_in_range, fetch_ratings_through, fetch_theme_mode,
};
use crate::export::{ExportFormat, ExportOutcome, ExportRange};
use crate::insights::{
    build_monthly_calendar, build_statistics, build_trend, build_weekly_summary,
    calculate_streaks, category_week_breakdown, has_minimum_data, week_end, DayIndicator,
    MonthlyCalendar, TrendData, TrendRange, UserStatistics, WeeklySummary,
};
use crate::models::{Category, DayRatings, FamilyMember, RatingValue, ThemeMode};

use super::helpers::step_index;

/// The daily rating form: one date, one member, every active category.
pub(crate) struct RateScreen {
    pub(crate) date: NaiveDate,
    pub(crate) members: Vec<FamilyMember>,
    pub(crate) member_idx: usize,
    pub(crate) categories: Vec<Category>,
    pub(crate) day: Option<DayRatings>,
    pub(crate) selected: usize,
}

impl RateScreen {
    pub(crate) fn load(conn: &Connection, date: NaiveDate) -> Result<Self> {
        let mut screen = Self {
            date,
            members: Vec::new(),
            member_idx: 0,
            categories: Vec::new(),
            day: None,
            selected: 0,
        };
        screen.refresh(conn)?;
        Ok(screen)
    }

    /// Re-query members, categories, and the current member's ratings while
    /// keeping the member and category selection where possible.
    pub(crate) fn refresh(&mut self, conn: &Connection) -> Result<()> {
        let member_id = self.current_member().map(|m| m.id);
        self.members = fetch_active_members(conn)?;
        self.member_idx = member_id
            .and_then(|id| self.members.iter().position(|m| m.id == id))
            .unwrap_or(0);

        self.categories = fetch_active_categories(conn)?;
        self.selected = step_index(self.selected, self.categories.len(), 0);

        self.day = match self.current_member() {
            Some(member) => fetch_day_ratings(conn, self.date, member.id)?,
            None => None,
        };
        Ok(())
    }

    pub(crate) fn current_member(&self) -> Option<&FamilyMember> {
        self.members.get(self.member_idx)
    }

    pub(crate) fn current_category(&self) -> Option<&Category> {
        self.categories.get(self.selected)
    }

    pub(crate) fn value_for(&self, category_id: i64) -> Option<RatingValue> {
        self.day
            .as_ref()
            .and_then(|day| day.rating_for(category_id))
            .map(|rating| rating.value)
    }

    pub(crate) fn rated_count(&self) -> usize {
        self.day.as_ref().map(DayRatings::rated_count).unwrap_or(0)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, self.categories.len(), offset);
    }

    pub(crate) fn cycle_member(&mut self, offset: isize) {
        if self.members.is_empty() {
            return;
        }
        let len = self.members.len() as isize;
        self.member_idx = (self.member_idx as isize + offset).rem_euclid(len) as usize;
    }
}

/// Every date that has a rating, newest first.
pub(crate) struct HistoryScreen {
    pub(crate) dates: Vec<NaiveDate>,
    pub(crate) selected: usize,
}

impl HistoryScreen {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        Ok(Self {
            dates: fetch_rated_dates(conn)?,
            selected: 0,
        })
    }

    /// Reload and keep the cursor on `focus` if it still has ratings.
    pub(crate) fn refresh(&mut self, conn: &Connection, focus: Option<NaiveDate>) -> Result<()> {
        self.dates = fetch_rated_dates(conn)?;
        if let Some(idx) = focus.and_then(|date| self.dates.iter().position(|d| *d == date)) {
            self.selected = idx;
        }
        self.selected = step_index(self.selected, self.dates.len(), 0);
        Ok(())
    }

    pub(crate) fn current_date(&self) -> Option<NaiveDate> {
        self.dates.get(self.selected).copied()
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, self.dates.len(), offset);
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.dates.len().saturating_sub(1);
    }
}

/// All members' ratings for one date.
pub(crate) struct DayDetailScreen {
    pub(crate) date: NaiveDate,
    pub(crate) entries: Vec<DayRatings>,
}

impl DayDetailScreen {
    pub(crate) fn load(conn: &Connection, date: NaiveDate) -> Result<Self> {
        Ok(Self {
            date,
            entries: fetch_all_day_ratings(conn, date)?,
        })
    }
}

/// Sub-views reachable from the insights hub.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum InsightsView {
    Week,
    Month,
    Trends,
    Statistics,
}

impl InsightsView {
    pub(crate) const ALL: [InsightsView; 4] = [
        InsightsView::Week,
        InsightsView::Month,
        InsightsView::Trends,
        InsightsView::Statistics,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            InsightsView::Week => "Weekly summary",
            InsightsView::Month => "Monthly calendar",
            InsightsView::Trends => "Trends",
            InsightsView::Statistics => "Statistics",
        }
    }
}

/// Streak overview plus the menu of detailed views.
pub(crate) struct InsightsScreen {
    pub(crate) rated_days: i64,
    pub(crate) current_streak: u32,
    pub(crate) longest_streak: u32,
    pub(crate) selected: usize,
}

impl InsightsScreen {
    pub(crate) fn load(conn: &Connection, today: NaiveDate) -> Result<Self> {
        let dates = fetch_rated_dates(conn)?;
        let (current_streak, longest_streak) = calculate_streaks(&dates, today);
        Ok(Self {
            rated_days: count_rated_days(conn)?,
            current_streak,
            longest_streak,
            selected: 0,
        })
    }

    pub(crate) fn has_minimum_data(&self) -> bool {
        has_minimum_data(self.rated_days)
    }

    pub(crate) fn current_view(&self) -> InsightsView {
        InsightsView::ALL[self.selected.min(InsightsView::ALL.len() - 1)]
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, InsightsView::ALL.len(), offset);
    }
}

/// Per-category rollup of one week.
pub(crate) struct WeekScreen {
    pub(crate) summary: WeeklySummary,
    pub(crate) selected: usize,
}

impl WeekScreen {
    pub(crate) fn load(conn: &Connection, date: NaiveDate) -> Result<Self> {
        let start = week_start(date, DEFAULT_FIRST_WEEKDAY);
        let ratings = fetch_ratings_in_range(conn, start, week_end(start))?;
        Ok(Self {
            summary: build_weekly_summary(start, &ratings),
            selected: 0,
        })
    }

    pub(crate) fn week_start(&self) -> NaiveDate {
        self.summary.start_date
    }

    /// Neighbouring week, or `None` when it would start after `today`.
    pub(crate) fn shifted_start(&self, weeks: i64, today: NaiveDate) -> Option<NaiveDate> {
        let days = Days::new(7 * weeks.unsigned_abs());
        let start = if weeks < 0 {
            self.week_start().checked_sub_days(days)?
        } else {
            self.week_start().checked_add_days(days)?
        };
        (start <= today).then_some(start)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, self.summary.category_summaries.len(), offset);
    }

    pub(crate) fn current_category(&self) -> Option<(i64, String)> {
        self.summary
            .category_summaries
            .get(self.selected)
            .map(|s| (s.category_id, s.category_name.clone()))
    }
}

/// Day-by-day view of one category inside a week.
pub(crate) struct CategoryWeekScreen {
    pub(crate) category_id: i64,
    pub(crate) category_name: String,
    pub(crate) week_start: NaiveDate,
    pub(crate) days: Vec<DayIndicator>,
}

impl CategoryWeekScreen {
    pub(crate) fn load(
        conn: &Connection,
        category_id: i64,
        category_name: String,
        week_start: NaiveDate,
    ) -> Result<Self> {
        let ratings = fetch_ratings_in_range(conn, week_start, week_end(week_start))?;
        let total_categories = fetch_active_categories(conn)?.len() as u32;
        Ok(Self {
            days: category_week_breakdown(category_id, week_start, &ratings, total_categories),
            category_id,
            category_name,
            week_start,
        })
    }
}

/// Heat map of the "Overall Day" category for one month.
pub(crate) struct MonthScreen {
    pub(crate) calendar: MonthlyCalendar,
    /// Days with any rating at all, not only "Overall Day".
    pub(crate) rated_days: usize,
}

impl MonthScreen {
    pub(crate) fn load(conn: &Connection, year: i32, month: u32) -> Result<Self> {
        let (start, end) = month_bounds(year, month)?;
        let overall = fetch_overall_ratings_in_range(conn, start, end)?;
        let all = fetch_ratings_in_range(conn, start, end)?;
        let total_categories = fetch_active_categories(conn)?.len() as u32;
        let calendar = build_monthly_calendar(
            year,
            month,
            &overall,
            &all,
            total_categories,
            DEFAULT_FIRST_WEEKDAY,
        )?;
        let rated_days = fetch_rated_dates_in_month(conn, year, month)?.len();
        Ok(Self {
            calendar,
            rated_days,
        })
    }

    /// `(year, month)` moved by `delta`, refusing months after `today`'s.
    pub(crate) fn shifted(&self, delta: i32, today: NaiveDate) -> Option<(i32, u32)> {
        let (year, month) = shift_month(self.calendar.year, self.calendar.month, delta);
        ((year, month) <= (today.year(), today.month())).then_some((year, month))
    }
}

/// Score history of one category over a selectable window.
pub(crate) struct TrendsScreen {
    pub(crate) categories: Vec<Category>,
    pub(crate) selected: usize,
    pub(crate) range: TrendRange,
    pub(crate) data: Option<TrendData>,
}

impl TrendsScreen {
    pub(crate) fn load(conn: &Connection, today: NaiveDate) -> Result<Self> {
        let mut screen = Self {
            categories: fetch_active_categories(conn)?,
            selected: 0,
            range: TrendRange::Month,
            data: None,
        };
        screen.refresh(conn, today)?;
        Ok(screen)
    }

    pub(crate) fn refresh(&mut self, conn: &Connection, today: NaiveDate) -> Result<()> {
        self.data = match self.categories.get(self.selected) {
            Some(category) => {
                let history = fetch_category_history(conn, category.id)?;
                Some(build_trend(
                    category.id,
                    &category.name,
                    self.range,
                    &history,
                    today,
                ))
            }
            None => None,
        };
        Ok(())
    }

    pub(crate) fn cycle_category(&mut self, offset: isize) {
        if self.categories.is_empty() {
            return;
        }
        let len = self.categories.len() as isize;
        self.selected = (self.selected as isize + offset).rem_euclid(len) as usize;
    }
}

pub(crate) struct StatisticsScreen {
    pub(crate) stats: UserStatistics,
}

impl StatisticsScreen {
    pub(crate) fn load(conn: &Connection, today: NaiveDate) -> Result<Self> {
        let dates = fetch_rated_dates(conn)?;
        let distribution = fetch_rating_distribution(conn)?;
        let ratings = fetch_ratings_through(conn, today)?;
        let categories = fetch_active_categories(conn)?;
        Ok(Self {
            stats: build_statistics(&dates, distribution, &ratings, &categories, today),
        })
    }
}

pub(crate) struct FamilyScreen {
    pub(crate) members: Vec<FamilyMember>,
    pub(crate) selected: usize,
}

impl FamilyScreen {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        Ok(Self {
            members: fetch_active_members(conn)?,
            selected: 0,
        })
    }

    pub(crate) fn refresh(&mut self, conn: &Connection, focus_id: Option<i64>) -> Result<()> {
        self.members = fetch_active_members(conn)?;
        if let Some(idx) = focus_id.and_then(|id| self.members.iter().position(|m| m.id == id)) {
            self.selected = idx;
        }
        self.selected = step_index(self.selected, self.members.len(), 0);
        Ok(())
    }

    pub(crate) fn current_member(&self) -> Option<&FamilyMember> {
        self.members.get(self.selected)
    }

    pub(crate) fn has_spouse(&self) -> bool {
        self.members.iter().any(FamilyMember::is_spouse)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, self.members.len(), offset);
    }
}

pub(crate) struct CategoriesScreen {
    pub(crate) categories: Vec<Category>,
    /// Owner names for spouse/child categories.
    pub(crate) owners: HashMap<i64, String>,
    pub(crate) selected: usize,
}

impl CategoriesScreen {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        let mut screen = Self {
            categories: Vec::new(),
            owners: HashMap::new(),
            selected: 0,
        };
        screen.refresh(conn, None)?;
        Ok(screen)
    }

    pub(crate) fn refresh(&mut self, conn: &Connection, focus_id: Option<i64>) -> Result<()> {
        self.categories = fetch_active_categories(conn)?;
        self.owners = fetch_active_members(conn)?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect();
        if let Some(idx) = focus_id.and_then(|id| self.categories.iter().position(|c| c.id == id))
        {
            self.selected = idx;
        }
        self.selected = step_index(self.selected, self.categories.len(), 0);
        Ok(())
    }

    pub(crate) fn current_category(&self) -> Option<&Category> {
        self.categories.get(self.selected)
    }

    pub(crate) fn owner_of(&self, category: &Category) -> Option<&str> {
        category
            .family_member_id
            .and_then(|id| self.owners.get(&id))
            .map(String::as_str)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, self.categories.len(), offset);
    }
}

/// Rows of the settings list.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum SettingsItem {
    Theme,
    Family,
    Categories,
    Export,
}

impl SettingsItem {
    pub(crate) const ALL: [SettingsItem; 4] = [
        SettingsItem::Theme,
        SettingsItem::Family,
        SettingsItem::Categories,
        SettingsItem::Export,
    ];
}

pub(crate) struct SettingsScreen {
    pub(crate) theme: ThemeMode,
    pub(crate) member_count: usize,
    pub(crate) category_count: usize,
    pub(crate) selected: usize,
}

impl SettingsScreen {
    pub(crate) fn load(conn: &Connection) -> Result<Self> {
        Ok(Self {
            theme: fetch_theme_mode(conn)?,
            member_count: fetch_active_members(conn)?.len(),
            category_count: fetch_active_categories(conn)?.len(),
            selected: 0,
        })
    }

    pub(crate) fn current_item(&self) -> SettingsItem {
        SettingsItem::ALL[self.selected.min(SettingsItem::ALL.len() - 1)]
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = step_index(self.selected, SettingsItem::ALL.len(), offset);
    }
}

#[derive(Default)]
pub(crate) struct ExportScreen {
    pub(crate) format: ExportFormat,
    pub(crate) range: ExportRange,
    pub(crate) last_export: Option<ExportOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{add_member, open_in_memory, save_rating};
    use crate::models::RelationshipType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rate_screen_keeps_member_after_refresh() {
        let conn = open_in_memory().expect("db");
        let spouse = add_member(&conn, "Alex", RelationshipType::Spouse).unwrap();
        let mut screen = RateScreen::load(&conn, date(2024, 5, 1)).unwrap();
        assert_eq!(screen.members.len(), 2);
        assert_eq!(screen.categories.len(), 5);

        screen.cycle_member(1);
        assert_eq!(screen.current_member().unwrap().id, spouse.id);
        let category = screen.current_category().unwrap().id;
        save_rating(&conn, category, spouse.id, screen.date, RatingValue::Neutral).unwrap();

        screen.refresh(&conn).unwrap();
        assert_eq!(screen.current_member().unwrap().id, spouse.id);
        assert_eq!(screen.value_for(category), Some(RatingValue::Neutral));
        assert_eq!(screen.rated_count(), 1);

        screen.cycle_member(1);
        assert!(screen.current_member().unwrap().is_self());
    }

    #[test]
    fn week_navigation_stops_at_current_week() {
        let conn = open_in_memory().expect("db");
        let today = date(2024, 5, 15);
        let screen = WeekScreen::load(&conn, today).unwrap();
        assert_eq!(screen.week_start(), date(2024, 5, 13));
        assert_eq!(screen.shifted_start(-1, today), Some(date(2024, 5, 6)));
        assert_eq!(screen.shifted_start(1, today), None);
    }

    #[test]
    fn month_navigation_stops_at_current_month() {
        let conn = open_in_memory().expect("db");
        let today = date(2024, 1, 20);
        let screen = MonthScreen::load(&conn, 2024, 1).unwrap();
        assert_eq!(screen.shifted(-1, today), Some((2023, 12)));
        assert_eq!(screen.shifted(1, today), None);
    }

    #[test]
    fn month_counts_days_rated_in_any_category() {
        let conn = open_in_memory().expect("db");
        let rate = RateScreen::load(&conn, date(2024, 2, 3)).unwrap();
        let me = rate.current_member().unwrap().id;
        let overall = rate.categories[0].id;
        let other = rate.categories[1].id;
        save_rating(&conn, other, me, date(2024, 2, 3), RatingValue::Neutral).unwrap();
        save_rating(&conn, overall, me, date(2024, 2, 5), RatingValue::Positive).unwrap();
        save_rating(&conn, overall, me, date(2024, 3, 1), RatingValue::Positive).unwrap();

        let screen = MonthScreen::load(&conn, 2024, 2).unwrap();
        assert_eq!(screen.rated_days, 2);
        assert_eq!(screen.calendar.day(3).and_then(|d| d.overall_rating), None);
        assert_eq!(
            screen.calendar.day(5).and_then(|d| d.overall_rating),
            Some(RatingValue::Positive)
        );
    }

    #[test]
    fn insights_hub_counts_streaks() {
        let conn = open_in_memory().expect("db");
        let rate = RateScreen::load(&conn, date(2024, 1, 1)).unwrap();
        let me = rate.current_member().unwrap().id;
        let overall = rate.current_category().unwrap().id;
        for day in 1..=4 {
            save_rating(&conn, overall, me, date(2024, 1, day), RatingValue::Positive).unwrap();
        }

        let screen = InsightsScreen::load(&conn, date(2024, 1, 4)).unwrap();
        assert!(screen.has_minimum_data());
        assert_eq!((screen.current_streak, screen.longest_streak), (4, 4));
        assert_eq!(screen.current_view(), InsightsView::Week);
    }
}
