use std::mem;

use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};
use crossterm::event::KeyCode;
use open::that as open_path;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap};
use ratatui::Frame;
use rusqlite::Connection;

use crate::calendar::month_name;
use crate::config::AppConfig;
use crate::db::{
    add_category, add_member, delete_category, delete_member, delete_rating, fetch_theme_mode,
    rename_category, rename_member, save_rating, save_theme_mode,
};
use crate::export::{export_to_file, ExportRange};
use crate::insights::TrendRange;
use crate::models::{RatingValue, RelationshipType, ThemeMode};

use super::forms::{
    ConfirmCategoryDelete, ConfirmMemberDelete, DateField, DateRangeForm, NameForm, NameTarget,
};
use super::helpers::{
    centered_rect, format_day, progress_bar, rating_color, rating_span, score_bar, surface_error,
    trend_glyph, weekday_short, Palette,
};
use super::screens::{
    CategoriesScreen, CategoryWeekScreen, DayDetailScreen, ExportScreen, FamilyScreen,
    HistoryScreen, InsightsScreen, InsightsView, MonthScreen, RateScreen, SettingsItem,
    SettingsScreen, StatisticsScreen, TrendsScreen, WeekScreen,
};

/// Tab bar at the top of every screen.
const HEADER_HEIGHT: u16 = 3;
/// Footer space reserved for status messages and instructions.
const FOOTER_HEIGHT: u16 = 3;
/// Width of the bars drawn next to percentages and averages.
const BAR_WIDTH: usize = 20;
/// Column reserved for category names in list rows.
const NAME_WIDTH: usize = 28;

/// The four top-level destinations cycled with `[` and `]`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Tab {
    Rate,
    Insights,
    History,
    Settings,
}

impl Tab {
    const ALL: [Tab; 4] = [Tab::Rate, Tab::Insights, Tab::History, Tab::Settings];

    fn title(self) -> &'static str {
        match self {
            Tab::Rate => "Rate",
            Tab::Insights => "Insights",
            Tab::History => "History",
            Tab::Settings => "Settings",
        }
    }

    fn index(self) -> usize {
        Self::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }
}

/// High-level navigation states. Each variant owns the state its view draws
/// from; the state is re-queried after every write.
enum Screen {
    Rate(RateScreen),
    History(HistoryScreen),
    DayDetail(DayDetailScreen),
    Insights(InsightsScreen),
    Week(WeekScreen),
    CategoryWeek(CategoryWeekScreen),
    Month(MonthScreen),
    Trends(TrendsScreen),
    Statistics(StatisticsScreen),
    Settings(SettingsScreen),
    Family(FamilyScreen),
    Categories(CategoriesScreen),
    Export(ExportScreen),
}

impl Screen {
    fn tab(&self) -> Tab {
        match self {
            Screen::Rate(_) => Tab::Rate,
            Screen::History(_) | Screen::DayDetail(_) => Tab::History,
            Screen::Insights(_)
            | Screen::Week(_)
            | Screen::CategoryWeek(_)
            | Screen::Month(_)
            | Screen::Trends(_)
            | Screen::Statistics(_) => Tab::Insights,
            Screen::Settings(_) | Screen::Family(_) | Screen::Categories(_) | Screen::Export(_) => {
                Tab::Settings
            }
        }
    }

    /// The tab roots; everything else is a sub-screen with a way back.
    fn is_top_level(&self) -> bool {
        matches!(
            self,
            Screen::Rate(_) | Screen::History(_) | Screen::Insights(_) | Screen::Settings(_)
        )
    }
}

/// Fine-grained modes scoped to the current screen.
enum Mode {
    Normal,
    EditingName { target: NameTarget, form: NameForm },
    ConfirmMemberDelete(ConfirmMemberDelete),
    ConfirmCategoryDelete(ConfirmCategoryDelete),
    EditingRange(DateRangeForm),
}

/// Holds the footer message text plus its severity.
struct StatusMessage {
    text: String,
    kind: StatusKind,
}

/// Severity levels shown in the footer.
enum StatusKind {
    Info,
    Error,
}

impl StatusKind {
    fn style(&self) -> Style {
        match self {
            StatusKind::Info => Style::default().fg(Color::Green),
            StatusKind::Error => Style::default().fg(Color::Red),
        }
    }
}

/// Central application state shared across the TUI.
pub struct App {
    conn: Connection,
    config: AppConfig,
    today: NaiveDate,
    theme: ThemeMode,
    screen: Screen,
    mode: Mode,
    status: Option<StatusMessage>,
}

impl App {
    /// Start on the rating screen for `today` with the stored theme applied.
    pub fn new(conn: Connection, config: AppConfig, today: NaiveDate) -> Result<Self> {
        let theme = fetch_theme_mode(&conn)?;
        let screen = Screen::Rate(RateScreen::load(&conn, today)?);
        Ok(Self {
            conn,
            config,
            today,
            theme,
            screen,
            mode: Mode::Normal,
            status: None,
        })
    }

    /// Route a key press to the active mode. Returns `true` when the user asked
    /// to quit.
    pub fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        let mut exit = false;
        let mode = mem::replace(&mut self.mode, Mode::Normal);

        self.mode = match mode {
            Mode::Normal => match self.handle_normal_key(code, &mut exit) {
                Ok(mode) => mode,
                Err(err) => {
                    tracing::warn!(error = %err, "action failed");
                    self.set_status(surface_error(&err), StatusKind::Error);
                    Mode::Normal
                }
            },
            Mode::EditingName { target, form } => self.handle_name_form(code, target, form)?,
            Mode::ConfirmMemberDelete(confirm) => {
                self.handle_confirm_member_delete(code, confirm)?
            }
            Mode::ConfirmCategoryDelete(confirm) => {
                self.handle_confirm_category_delete(code, confirm)?
            }
            Mode::EditingRange(form) => self.handle_range_form(code, form)?,
        };

        Ok(exit)
    }

    fn handle_normal_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        match code {
            KeyCode::Char('q') if self.screen.is_top_level() => {
                *exit = true;
                return Ok(Mode::Normal);
            }
            KeyCode::Char('[') => {
                self.switch_tab(-1)?;
                return Ok(Mode::Normal);
            }
            KeyCode::Char(']') => {
                self.switch_tab(1)?;
                return Ok(Mode::Normal);
            }
            _ => {}
        }

        match self.screen {
            Screen::Rate(_) => self.handle_rate_key(code, exit),
            Screen::History(_) => self.handle_history_key(code, exit),
            Screen::DayDetail(_) => self.handle_day_detail_key(code),
            Screen::Insights(_) => self.handle_insights_key(code, exit),
            Screen::Week(_) => self.handle_week_key(code),
            Screen::CategoryWeek(_) => self.handle_category_week_key(code),
            Screen::Month(_) => self.handle_month_key(code),
            Screen::Trends(_) => self.handle_trends_key(code),
            Screen::Statistics(_) => {
                if code == KeyCode::Esc {
                    self.open_tab(Tab::Insights)?;
                }
                Ok(Mode::Normal)
            }
            Screen::Settings(_) => self.handle_settings_key(code, exit),
            Screen::Family(_) => self.handle_family_key(code),
            Screen::Categories(_) => self.handle_categories_key(code),
            Screen::Export(_) => self.handle_export_key(code),
        }
    }

    fn handle_rate_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let today = self.today;
        let Screen::Rate(rate) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => *exit = true,
            KeyCode::Up => rate.move_selection(-1),
            KeyCode::Down => rate.move_selection(1),
            KeyCode::Tab => {
                rate.cycle_member(1);
                rate.refresh(&self.conn)?;
            }
            KeyCode::BackTab => {
                rate.cycle_member(-1);
                rate.refresh(&self.conn)?;
            }
            KeyCode::Left => {
                if let Some(previous) = rate.date.pred_opt() {
                    rate.date = previous;
                    rate.refresh(&self.conn)?;
                }
            }
            KeyCode::Right => match rate.date.succ_opt().filter(|next| *next <= today) {
                Some(next) => {
                    rate.date = next;
                    rate.refresh(&self.conn)?;
                }
                None => self.set_status("Future days cannot be rated.", StatusKind::Error),
            },
            KeyCode::Char('t') | KeyCode::Char('T') => {
                rate.date = today;
                rate.refresh(&self.conn)?;
            }
            KeyCode::Char(ch @ '1'..='3') => {
                let value = RatingValue::ALL[(ch as u8 - b'1') as usize];
                self.rate_selected(value)?;
            }
            KeyCode::Char('0') | KeyCode::Backspace | KeyCode::Delete => self.clear_selected()?,
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_history_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::History(history) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => *exit = true,
            KeyCode::Up => history.move_selection(-1),
            KeyCode::Down => history.move_selection(1),
            KeyCode::PageUp => history.move_selection(-10),
            KeyCode::PageDown => history.move_selection(10),
            KeyCode::Home => history.select_first(),
            KeyCode::End => history.select_last(),
            KeyCode::Enter => match history.current_date() {
                Some(date) => {
                    self.screen = Screen::DayDetail(DayDetailScreen::load(&self.conn, date)?);
                }
                None => self.set_status("No rated days yet.", StatusKind::Error),
            },
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(date) = history.current_date() {
                    self.open_rate_on(date)?;
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_day_detail_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::DayDetail(detail) = &self.screen else {
            return Ok(Mode::Normal);
        };
        let date = detail.date;

        match code {
            KeyCode::Esc => {
                let mut history = HistoryScreen::load(&self.conn)?;
                history.refresh(&self.conn, Some(date))?;
                self.screen = Screen::History(history);
            }
            KeyCode::Char('e') | KeyCode::Char('E') => self.open_rate_on(date)?,
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_insights_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Insights(insights) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => *exit = true,
            KeyCode::Up => insights.move_selection(-1),
            KeyCode::Down => insights.move_selection(1),
            KeyCode::Enter => {
                if !insights.has_minimum_data() {
                    self.set_status(
                        "Rate at least 4 days to unlock insights.",
                        StatusKind::Error,
                    );
                    return Ok(Mode::Normal);
                }
                let view = insights.current_view();
                self.open_insights_view(view)?;
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn open_insights_view(&mut self, view: InsightsView) -> Result<()> {
        self.screen = match view {
            InsightsView::Week => Screen::Week(WeekScreen::load(&self.conn, self.today)?),
            InsightsView::Month => Screen::Month(MonthScreen::load(
                &self.conn,
                self.today.year(),
                self.today.month(),
            )?),
            InsightsView::Trends => Screen::Trends(TrendsScreen::load(&self.conn, self.today)?),
            InsightsView::Statistics => {
                Screen::Statistics(StatisticsScreen::load(&self.conn, self.today)?)
            }
        };
        Ok(())
    }

    fn handle_week_key(&mut self, code: KeyCode) -> Result<Mode> {
        let today = self.today;
        let Screen::Week(week) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => self.open_tab(Tab::Insights)?,
            KeyCode::Up => week.move_selection(-1),
            KeyCode::Down => week.move_selection(1),
            KeyCode::Left | KeyCode::Right => {
                let weeks = if code == KeyCode::Left { -1 } else { 1 };
                match week.shifted_start(weeks, today) {
                    Some(start) => *week = WeekScreen::load(&self.conn, start)?,
                    None => self.set_status("That week has not started yet.", StatusKind::Error),
                }
            }
            KeyCode::Enter => {
                if let Some((category_id, name)) = week.current_category() {
                    let start = week.week_start();
                    self.screen = Screen::CategoryWeek(CategoryWeekScreen::load(
                        &self.conn,
                        category_id,
                        name,
                        start,
                    )?);
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_category_week_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::CategoryWeek(detail) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => {
                let mut week = WeekScreen::load(&self.conn, detail.week_start)?;
                if let Some(idx) = week
                    .summary
                    .category_summaries
                    .iter()
                    .position(|s| s.category_id == detail.category_id)
                {
                    week.selected = idx;
                }
                self.screen = Screen::Week(week);
            }
            KeyCode::Left | KeyCode::Right => {
                let shifted = if code == KeyCode::Left {
                    detail.week_start.checked_sub_days(Days::new(7))
                } else {
                    detail
                        .week_start
                        .checked_add_days(Days::new(7))
                        .filter(|start| *start <= self.today)
                };
                match shifted {
                    Some(start) => {
                        *detail = CategoryWeekScreen::load(
                            &self.conn,
                            detail.category_id,
                            detail.category_name.clone(),
                            start,
                        )?;
                    }
                    None => self.set_status("That week has not started yet.", StatusKind::Error),
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_month_key(&mut self, code: KeyCode) -> Result<Mode> {
        let today = self.today;
        let Screen::Month(month) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => self.open_tab(Tab::Insights)?,
            KeyCode::Left | KeyCode::Right => {
                let delta = if code == KeyCode::Left { -1 } else { 1 };
                match month.shifted(delta, today) {
                    Some((year, m)) => *month = MonthScreen::load(&self.conn, year, m)?,
                    None => self.set_status("That month has not started yet.", StatusKind::Error),
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_trends_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::Trends(trends) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => self.open_tab(Tab::Insights)?,
            KeyCode::Left => {
                trends.cycle_category(-1);
                trends.refresh(&self.conn, self.today)?;
            }
            KeyCode::Right => {
                trends.cycle_category(1);
                trends.refresh(&self.conn, self.today)?;
            }
            KeyCode::Tab | KeyCode::Char('r') | KeyCode::Char('R') => {
                trends.range = trends.range.next();
                trends.refresh(&self.conn, self.today)?;
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_settings_key(&mut self, code: KeyCode, exit: &mut bool) -> Result<Mode> {
        let Screen::Settings(settings) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => *exit = true,
            KeyCode::Up => settings.move_selection(-1),
            KeyCode::Down => settings.move_selection(1),
            KeyCode::Enter | KeyCode::Char(' ') => match settings.current_item() {
                SettingsItem::Theme => {
                    let next = settings.theme.next();
                    save_theme_mode(&self.conn, next)?;
                    settings.theme = next;
                    self.theme = next;
                    self.set_status(format!("Theme set to {}.", next.label()), StatusKind::Info);
                }
                SettingsItem::Family => {
                    self.screen = Screen::Family(FamilyScreen::load(&self.conn)?);
                }
                SettingsItem::Categories => {
                    self.screen = Screen::Categories(CategoriesScreen::load(&self.conn)?);
                }
                SettingsItem::Export => {
                    self.screen = Screen::Export(ExportScreen::default());
                }
            },
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_family_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::Family(family) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => self.open_tab(Tab::Settings)?,
            KeyCode::Up => family.move_selection(-1),
            KeyCode::Down => family.move_selection(1),
            KeyCode::Char('s') | KeyCode::Char('S') => {
                if family.has_spouse() {
                    self.set_status("You can only have one spouse.", StatusKind::Error);
                } else {
                    return Ok(Mode::EditingName {
                        target: NameTarget::NewMember(RelationshipType::Spouse),
                        form: NameForm::default(),
                    });
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                return Ok(Mode::EditingName {
                    target: NameTarget::NewMember(RelationshipType::Child),
                    form: NameForm::default(),
                });
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if let Some(member) = family.current_member() {
                    return Ok(Mode::EditingName {
                        target: NameTarget::Member(member.id),
                        form: NameForm::with_value(&member.name),
                    });
                }
            }
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Delete => {
                match family.current_member() {
                    Some(member) if member.can_delete() => {
                        return Ok(Mode::ConfirmMemberDelete(ConfirmMemberDelete::from(member)));
                    }
                    Some(_) => self.set_status("You cannot remove yourself.", StatusKind::Error),
                    None => {}
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_categories_key(&mut self, code: KeyCode) -> Result<Mode> {
        let Screen::Categories(categories) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => self.open_tab(Tab::Settings)?,
            KeyCode::Up => categories.move_selection(-1),
            KeyCode::Down => categories.move_selection(1),
            KeyCode::Char('+') | KeyCode::Char('a') | KeyCode::Char('A') => {
                return Ok(Mode::EditingName {
                    target: NameTarget::NewCategory,
                    form: NameForm::default(),
                });
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                if let Some(category) = categories.current_category() {
                    return Ok(Mode::EditingName {
                        target: NameTarget::Category(category.id),
                        form: NameForm::with_value(&category.name),
                    });
                }
            }
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Delete => {
                match categories.current_category() {
                    Some(category) if category.can_delete() => {
                        return Ok(Mode::ConfirmCategoryDelete(ConfirmCategoryDelete::from(
                            category,
                        )));
                    }
                    Some(_) => self.set_status(
                        "Only custom categories can be deleted.",
                        StatusKind::Error,
                    ),
                    None => {}
                }
            }
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_export_key(&mut self, code: KeyCode) -> Result<Mode> {
        let today = self.today;
        let Screen::Export(export) = &mut self.screen else {
            return Ok(Mode::Normal);
        };

        match code {
            KeyCode::Esc => self.open_tab(Tab::Settings)?,
            KeyCode::Char('f') | KeyCode::Char('F') | KeyCode::Tab => {
                export.format = export.format.toggle();
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                export.range = export.range.next(today);
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                let form = match export.range {
                    ExportRange::Custom { start, end } => DateRangeForm::from_range(start, end),
                    _ => DateRangeForm::from_range(today - Days::new(7), today),
                };
                return Ok(Mode::EditingRange(form));
            }
            KeyCode::Enter => self.perform_export()?,
            KeyCode::Char('o') | KeyCode::Char('O') => match &export.last_export {
                Some(outcome) => {
                    let path = outcome.path.clone();
                    match open_path(&path) {
                        Ok(()) => {
                            self.set_status(format!("Opened {}.", path.display()), StatusKind::Info)
                        }
                        Err(err) => self.set_status(
                            format!("Failed to open export: {err}"),
                            StatusKind::Error,
                        ),
                    }
                }
                None => self.set_status("Nothing exported yet.", StatusKind::Error),
            },
            _ => {}
        }
        Ok(Mode::Normal)
    }

    fn handle_name_form(
        &mut self,
        code: KeyCode,
        target: NameTarget,
        mut form: NameForm,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Cancelled.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.save_name(&target, &form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::EditingName { target, form })
    }

    fn handle_confirm_member_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmMemberDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_member_delete(&confirm) {
                    Ok(()) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmMemberDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmMemberDelete(confirm)),
        }
    }

    fn handle_confirm_category_delete(
        &mut self,
        code: KeyCode,
        confirm: ConfirmCategoryDelete,
    ) -> Result<Mode> {
        match code {
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('N') => {
                self.set_status("Deletion cancelled.", StatusKind::Info);
                Ok(Mode::Normal)
            }
            KeyCode::Enter | KeyCode::Char('y') | KeyCode::Char('Y') => {
                match self.perform_category_delete(&confirm) {
                    Ok(()) => Ok(Mode::Normal),
                    Err(err) => {
                        self.set_status(surface_error(&err), StatusKind::Error);
                        Ok(Mode::ConfirmCategoryDelete(confirm))
                    }
                }
            }
            _ => Ok(Mode::ConfirmCategoryDelete(confirm)),
        }
    }

    fn handle_range_form(&mut self, code: KeyCode, mut form: DateRangeForm) -> Result<Mode> {
        match code {
            KeyCode::Esc => {
                self.set_status("Custom range unchanged.", StatusKind::Info);
                return Ok(Mode::Normal);
            }
            KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
            KeyCode::Backspace => form.backspace(),
            KeyCode::Enter => match self.apply_custom_range(&form) {
                Ok(()) => return Ok(Mode::Normal),
                Err(err) => {
                    let message = surface_error(&err);
                    form.error = Some(message.clone());
                    self.set_status(message, StatusKind::Error);
                }
            },
            KeyCode::Char(ch) => {
                if form.push_char(ch) {
                    form.error = None;
                }
            }
            _ => {}
        }
        Ok(Mode::EditingRange(form))
    }

    pub(crate) fn draw(&self, frame: &mut Frame) {
        let area = frame.area();
        let palette = self.palette();
        frame.render_widget(Block::default().style(palette.base()), area);

        let footer_height = FOOTER_HEIGHT.min(area.height);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT.min(area.height)),
                Constraint::Min(0),
                Constraint::Length(footer_height),
            ])
            .split(area);

        self.draw_tabs(frame, chunks[0]);

        let content_area = chunks[1];
        match &self.screen {
            Screen::Rate(rate) => self.draw_rate(frame, content_area, rate),
            Screen::History(history) => self.draw_history(frame, content_area, history),
            Screen::DayDetail(detail) => self.draw_day_detail(frame, content_area, detail),
            Screen::Insights(insights) => self.draw_insights(frame, content_area, insights),
            Screen::Week(week) => self.draw_week(frame, content_area, week),
            Screen::CategoryWeek(detail) => self.draw_category_week(frame, content_area, detail),
            Screen::Month(month) => self.draw_month(frame, content_area, month),
            Screen::Trends(trends) => self.draw_trends(frame, content_area, trends),
            Screen::Statistics(stats) => self.draw_statistics(frame, content_area, stats),
            Screen::Settings(settings) => self.draw_settings(frame, content_area, settings),
            Screen::Family(family) => self.draw_family(frame, content_area, family),
            Screen::Categories(categories) => {
                self.draw_categories(frame, content_area, categories)
            }
            Screen::Export(export) => self.draw_export(frame, content_area, export),
        }

        if footer_height > 0 {
            self.draw_footer(frame, chunks[2]);
        }

        match &self.mode {
            Mode::EditingName { target, form } => {
                self.draw_name_form(frame, area, target.title(), form)
            }
            Mode::ConfirmMemberDelete(confirm) => self.draw_confirm(
                frame,
                area,
                "Remove Family Member",
                vec![
                    Line::from(format!("Remove {}?", confirm.name)),
                    Line::from("Their interaction category is hidden too; ratings are kept."),
                ],
            ),
            Mode::ConfirmCategoryDelete(confirm) => self.draw_confirm(
                frame,
                area,
                "Delete Category",
                vec![
                    Line::from(format!("Delete the category \"{}\"?", confirm.name)),
                    Line::from("Past ratings stay in exports."),
                ],
            ),
            Mode::EditingRange(form) => self.draw_range_form(frame, area, form),
            Mode::Normal => {}
        }
    }

    fn draw_tabs(&self, frame: &mut Frame, area: Rect) {
        let palette = self.palette();
        let tabs = Tabs::new(Tab::ALL.iter().map(|tab| tab.title()))
            .block(Block::default().borders(Borders::ALL).title(" Day Rater "))
            .select(self.screen.tab().index())
            .style(palette.base())
            .highlight_style(palette.highlight());
        frame.render_widget(tabs, area);
    }

    fn draw_rate(&self, frame: &mut Frame, area: Rect, rate: &RateScreen) {
        let palette = self.palette();
        let member_name = rate
            .current_member()
            .map(|m| m.name.as_str())
            .unwrap_or("-");
        let mut title = format!(" {} · {} ", format_day(rate.date), member_name);
        if rate.date == self.today {
            title = format!(" Today · {} · {} ", rate.date, member_name);
        }
        let block = Block::default().title(title).borders(Borders::ALL);

        if rate.categories.is_empty() {
            let message = Paragraph::new("No active categories. Add one under Settings.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let inner = block.inner(area);
        frame.render_widget(block, area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(1)])
            .split(inner);

        let total = rate.categories.len();
        let rated = rate.rated_count();
        let summary = Line::from(vec![
            Span::raw(format!("Rated {rated}/{total}  ")),
            Span::styled(
                progress_bar(rated as f32 / total as f32, BAR_WIDTH),
                palette.dim(),
            ),
        ]);
        frame.render_widget(Paragraph::new(summary), chunks[0]);

        let items: Vec<ListItem> = rate
            .categories
            .iter()
            .map(|category| {
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<NAME_WIDTH$}", category.name)),
                    rating_span(rate.value_for(category.id)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(rate.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_history(&self, frame: &mut Frame, area: Rect, history: &HistoryScreen) {
        let block = Block::default()
            .title(format!(" History · {} rated days ", history.dates.len()))
            .borders(Borders::ALL);

        if history.dates.is_empty() {
            let message = Paragraph::new("No ratings yet. Rate your day on the Rate tab.")
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(message, area);
            return;
        }

        let items: Vec<ListItem> = history
            .dates
            .iter()
            .map(|date| {
                let mut text = format_day(*date);
                if *date == self.today {
                    text.push_str("  (today)");
                }
                ListItem::new(text)
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(self.palette().highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(history.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_day_detail(&self, frame: &mut Frame, area: Rect, detail: &DayDetailScreen) {
        let palette = self.palette();
        let mut lines = Vec::new();
        for entry in &detail.entries {
            lines.push(Line::from(Span::styled(
                entry.member.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            if entry.has_ratings() {
                for rating in &entry.ratings {
                    lines.push(Line::from(vec![
                        Span::raw(format!("  {:<NAME_WIDTH$}", rating.category_name)),
                        rating_span(Some(rating.value)),
                    ]));
                }
            } else {
                lines.push(Line::from(Span::styled("  Nothing rated", palette.dim())));
            }
            lines.push(Line::from(""));
        }

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(format!(" {} ", format_day(detail.date)))
                    .borders(Borders::ALL),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_insights(&self, frame: &mut Frame, area: Rect, insights: &InsightsScreen) {
        let palette = self.palette();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(1)])
            .split(area);

        let mut lines = vec![
            Line::from(format!("Current streak: {} days", insights.current_streak)),
            Line::from(format!("Longest streak: {} days", insights.longest_streak)),
            Line::from(format!("Days rated:     {}", insights.rated_days)),
        ];
        if !insights.has_minimum_data() {
            lines.push(Line::from(Span::styled(
                "Rate at least 4 days to unlock insights.",
                Style::default().fg(Color::Yellow),
            )));
        }
        let overview = Paragraph::new(lines)
            .block(Block::default().title(" Insights ").borders(Borders::ALL));
        frame.render_widget(overview, chunks[0]);

        let items: Vec<ListItem> = InsightsView::ALL
            .iter()
            .map(|view| {
                let style = if insights.has_minimum_data() {
                    Style::default()
                } else {
                    palette.dim()
                };
                ListItem::new(Span::styled(view.label(), style))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL))
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(insights.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_week(&self, frame: &mut Frame, area: Rect, week: &WeekScreen) {
        let palette = self.palette();
        let summary = &week.summary;
        let block = Block::default()
            .title(format!(
                " Week of {} to {} ",
                summary.start_date, summary.end_date
            ))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(1)])
            .split(inner);
        let header = Line::from(vec![
            Span::raw(format!("Days rated {}/7  ", summary.days_rated)),
            Span::styled(progress_bar(summary.completion(), BAR_WIDTH), palette.dim()),
        ]);
        frame.render_widget(Paragraph::new(header), chunks[0]);

        if summary.category_summaries.is_empty() {
            frame.render_widget(
                Paragraph::new("No ratings this week.").alignment(Alignment::Center),
                chunks[1],
            );
            return;
        }

        let items: Vec<ListItem> = summary
            .category_summaries
            .iter()
            .map(|s| {
                let mut spans = vec![Span::raw(format!("{:<NAME_WIDTH$}", s.category_name))];
                for value in RatingValue::ALL.iter().rev() {
                    spans.push(Span::styled(
                        format!("{} {:<3} ", value.emoji(), s.counts.count(*value)),
                        Style::default().fg(rating_color(Some(*value))),
                    ));
                }
                if let Some(average) = s.average_score() {
                    spans.push(Span::styled(format!(" avg {average:.2}"), palette.dim()));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(week.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    fn draw_category_week(&self, frame: &mut Frame, area: Rect, detail: &CategoryWeekScreen) {
        let palette = self.palette();
        let lines: Vec<Line> = detail
            .days
            .iter()
            .map(|day| {
                Line::from(vec![
                    Span::raw(format!("{:<16}", format_day(day.date))),
                    rating_span(day.overall_rating),
                    Span::styled(
                        format!(
                            "   {}/{} categories",
                            day.ratings_count, day.total_categories
                        ),
                        palette.dim(),
                    ),
                ])
            })
            .collect();

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(format!(
                    " {} · week of {} ",
                    detail.category_name, detail.week_start
                ))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_month(&self, frame: &mut Frame, area: Rect, month: &MonthScreen) {
        let palette = self.palette();
        let calendar = &month.calendar;

        let mut lines = Vec::new();
        let mut weekday = calendar.first_weekday;
        let mut header = Vec::with_capacity(7);
        for _ in 0..7 {
            header.push(Span::styled(
                format!("{:<5}", weekday_short(weekday)),
                palette.dim(),
            ));
            weekday = weekday.succ();
        }
        lines.push(Line::from(header));

        let mut cell = calendar.start_offset();
        let mut row: Vec<Span> = (0..cell).map(|_| Span::raw("     ")).collect();
        for day in &calendar.days {
            let fg = if day.overall_rating.is_some() {
                Color::Black
            } else {
                Color::Gray
            };
            let mut style = Style::default().fg(fg).bg(rating_color(day.overall_rating));
            if day.date == self.today {
                style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
            }
            row.push(Span::styled(format!(" {:>2} ", day.date.day()), style));
            row.push(Span::raw(" "));
            cell += 1;
            if cell % 7 == 0 {
                lines.push(Line::from(mem::take(&mut row)));
            }
        }
        if !row.is_empty() {
            lines.push(Line::from(row));
        }

        let complete = calendar.days.iter().filter(|d| d.is_complete()).count();
        lines.push(Line::from(""));
        lines.push(Line::from(format!(
            "Days rated: {}   Fully rated: {complete}",
            month.rated_days
        )));
        let mut legend = Vec::new();
        for value in RatingValue::ALL.iter().rev() {
            legend.push(Span::styled(
                "■ ",
                Style::default().fg(rating_color(Some(*value))),
            ));
            legend.push(Span::raw(format!("{}  ", value.label())));
        }
        legend.push(Span::styled("■ ", Style::default().fg(rating_color(None))));
        legend.push(Span::raw("Not rated"));
        lines.push(Line::from(legend));

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .title(format!(
                    " {} {} ",
                    month_name(calendar.month),
                    calendar.year
                ))
                .borders(Borders::ALL),
        );
        frame.render_widget(paragraph, area);
    }

    fn draw_trends(&self, frame: &mut Frame, area: Rect, trends: &TrendsScreen) {
        let palette = self.palette();
        let block = Block::default()
            .title(format!(" Trends · {} ", trends.range.label()))
            .borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let Some(data) = &trends.data else {
            frame.render_widget(
                Paragraph::new("No categories to chart.").alignment(Alignment::Center),
                inner,
            );
            return;
        };

        let mut lines = vec![
            Line::from(vec![
                Span::raw("Category: "),
                Span::styled(
                    data.category_name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(format!(
                "Range:    {}",
                TrendRange::ALL
                    .iter()
                    .map(|r| if *r == trends.range {
                        format!("[{}]", r.label())
                    } else {
                        r.label().to_string()
                    })
                    .collect::<Vec<_>>()
                    .join("  ")
            )),
            Line::from(""),
        ];

        match data.average_score() {
            Some(average) => {
                lines.push(Line::from(vec![
                    Span::raw(format!(
                        "Average {average:.2} over {} days  ",
                        data.rated_days()
                    )),
                    Span::styled(score_bar(average, BAR_WIDTH), palette.dim()),
                ]));
                lines.push(Line::from(""));
                let width = inner.width as usize;
                let skip = data.points.len().saturating_sub(width);
                let chart: Vec<Span> = data.points[skip..]
                    .iter()
                    .map(|point| {
                        Span::styled(
                            trend_glyph(point.value),
                            Style::default().fg(rating_color(Some(point.value))),
                        )
                    })
                    .collect();
                lines.push(Line::from(chart));
                if let (Some(first), Some(last)) = (data.points.get(skip), data.points.last()) {
                    lines.push(Line::from(Span::styled(
                        format!("{} to {}", first.date, last.date),
                        palette.dim(),
                    )));
                }
            }
            None => lines.push(Line::from(Span::styled(
                "No ratings in this range.",
                palette.dim(),
            ))),
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_statistics(&self, frame: &mut Frame, area: Rect, screen: &StatisticsScreen) {
        let palette = self.palette();
        let stats = &screen.stats;
        let bold = Style::default().add_modifier(Modifier::BOLD);

        let mut lines = vec![
            Line::from(format!("Current streak:  {} days", stats.current_streak)),
            Line::from(format!("Longest streak:  {} days", stats.longest_streak)),
            Line::from(format!("Days rated:      {}", stats.total_days_rated)),
        ];
        if let Some(first) = stats.first_rating_date {
            lines.push(Line::from(format!("Journal since:   {first}")));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Rating distribution", bold)));
        for value in RatingValue::ALL.iter().rev() {
            let percent = stats.distribution.percent(*value);
            lines.push(Line::from(vec![
                Span::raw(format!("  {:<12}{:>5.1}%  ", value.to_string(), percent)),
                Span::styled(
                    progress_bar(percent / 100.0, BAR_WIDTH),
                    Style::default().fg(rating_color(Some(*value))),
                ),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Average by category", bold)));
        for average in stats.category_averages.values() {
            lines.push(Line::from(vec![
                Span::raw(format!(
                    "  {:<NAME_WIDTH$}{:.2}  ",
                    average.category_name, average.average_score
                )),
                Span::styled(score_bar(average.average_score, BAR_WIDTH), palette.dim()),
                Span::styled(format!("  ({})", average.total_ratings), palette.dim()),
            ]));
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled("Average by weekday", bold)));
        for (weekday, average) in &stats.day_of_week_averages {
            lines.push(Line::from(vec![
                Span::raw(format!("  {:<6}{average:.2}  ", weekday_short(*weekday))),
                Span::styled(score_bar(*average, BAR_WIDTH), palette.dim()),
            ]));
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().title(" Statistics ").borders(Borders::ALL))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_settings(&self, frame: &mut Frame, area: Rect, settings: &SettingsScreen) {
        let items: Vec<ListItem> = SettingsItem::ALL
            .iter()
            .map(|item| {
                let text = match item {
                    SettingsItem::Theme => format!("Theme: {}", settings.theme.label()),
                    SettingsItem::Family => {
                        format!("Family members ({})", settings.member_count)
                    }
                    SettingsItem::Categories => {
                        format!("Categories ({})", settings.category_count)
                    }
                    SettingsItem::Export => "Export data".to_string(),
                };
                ListItem::new(text)
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().title(" Settings ").borders(Borders::ALL))
            .highlight_style(self.palette().highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(settings.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_family(&self, frame: &mut Frame, area: Rect, family: &FamilyScreen) {
        let palette = self.palette();
        let items: Vec<ListItem> = family
            .members
            .iter()
            .map(|member| {
                let mut spans = vec![Span::raw(format!("{:<24}", member.name))];
                spans.push(Span::styled(member.relationship.label(), palette.dim()));
                if member.is_self() {
                    spans.push(Span::styled("  (you)", palette.dim()));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().title(" Family ").borders(Borders::ALL))
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(family.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_categories(&self, frame: &mut Frame, area: Rect, categories: &CategoriesScreen) {
        let palette = self.palette();
        let items: Vec<ListItem> = categories
            .categories
            .iter()
            .map(|category| {
                let mut detail = category.kind.label().to_string();
                if let Some(owner) = categories.owner_of(category) {
                    detail.push_str(&format!(" · {owner}"));
                }
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{:<NAME_WIDTH$}", category.name)),
                    Span::styled(detail, palette.dim()),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(Block::default().title(" Categories ").borders(Borders::ALL))
            .highlight_style(palette.highlight())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(categories.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_export(&self, frame: &mut Frame, area: Rect, export: &ExportScreen) {
        let palette = self.palette();
        let mut lines = vec![
            Line::from(vec![
                Span::raw("Format: "),
                Span::styled(export.format.label(), palette.key()),
                Span::styled(format!("  ({})", export.format.mime_type()), palette.dim()),
            ]),
            Line::from(vec![
                Span::raw("Range:  "),
                Span::styled(export.range.label(), palette.key()),
            ]),
            Line::from(vec![
                Span::raw("Folder: "),
                Span::styled(
                    self.config.export_dir().display().to_string(),
                    palette.dim(),
                ),
            ]),
            Line::from(""),
        ];

        if let Some(outcome) = &export.last_export {
            lines.push(Line::from(Span::styled(
                format!(
                    "Saved {} ratings to {}",
                    outcome.rows,
                    outcome.path.display()
                ),
                Style::default().fg(Color::Green),
            )));
        }

        let paragraph = Paragraph::new(lines)
            .block(Block::default().title(" Export ").borders(Borders::ALL))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::TOP);
        frame.render_widget(block.clone(), area);
        let inner = block.inner(area);

        let status_line = if let Some(status) = &self.status {
            Line::from(vec![Span::styled(status.text.clone(), status.kind.style())])
        } else {
            Line::from("")
        };

        let instructions = self.footer_instructions();

        let paragraph = Paragraph::new(vec![status_line, instructions]).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn hints(&self, pairs: &[(&str, &str)]) -> Line<'static> {
        let key_style = self.palette().key();
        let mut spans = Vec::with_capacity(pairs.len() * 2);
        for (keys, action) in pairs {
            spans.push(Span::styled(format!("[{keys}]"), key_style));
            spans.push(Span::raw(format!(" {action}   ")));
        }
        Line::from(spans)
    }

    fn footer_instructions(&self) -> Line<'static> {
        match (&self.screen, &self.mode) {
            (_, Mode::EditingName { .. }) => {
                self.hints(&[("Enter", "Save"), ("Esc", "Cancel")])
            }
            (_, Mode::ConfirmMemberDelete(_)) | (_, Mode::ConfirmCategoryDelete(_)) => {
                self.hints(&[("Y", "Confirm"), ("N/Esc", "Cancel")])
            }
            (_, Mode::EditingRange(_)) => {
                self.hints(&[("Tab", "Switch field"), ("Enter", "Apply"), ("Esc", "Cancel")])
            }
            (Screen::Rate(_), _) => self.hints(&[
                ("1/2/3", "Sad/Neutral/Happy"),
                ("0", "Clear"),
                ("←→", "Day"),
                ("t", "Today"),
                ("Tab", "Member"),
                ("[ ]", "Tabs"),
                ("q", "Quit"),
            ]),
            (Screen::History(_), _) => self.hints(&[
                ("↑↓", "Navigate"),
                ("Enter", "Details"),
                ("e", "Edit day"),
                ("[ ]", "Tabs"),
                ("q", "Quit"),
            ]),
            (Screen::DayDetail(_), _) => {
                self.hints(&[("e", "Edit day"), ("Esc", "Back")])
            }
            (Screen::Insights(_), _) => self.hints(&[
                ("↑↓", "Navigate"),
                ("Enter", "Open"),
                ("[ ]", "Tabs"),
                ("q", "Quit"),
            ]),
            (Screen::Week(_), _) => self.hints(&[
                ("←→", "Week"),
                ("↑↓", "Category"),
                ("Enter", "Daily view"),
                ("Esc", "Back"),
            ]),
            (Screen::CategoryWeek(_), _) => self.hints(&[("←→", "Week"), ("Esc", "Back")]),
            (Screen::Month(_), _) => self.hints(&[("←→", "Month"), ("Esc", "Back")]),
            (Screen::Trends(_), _) => {
                self.hints(&[("←→", "Category"), ("r", "Range"), ("Esc", "Back")])
            }
            (Screen::Statistics(_), _) => self.hints(&[("Esc", "Back")]),
            (Screen::Settings(_), _) => self.hints(&[
                ("↑↓", "Navigate"),
                ("Enter", "Select"),
                ("[ ]", "Tabs"),
                ("q", "Quit"),
            ]),
            (Screen::Family(_), _) => self.hints(&[
                ("s", "Add spouse"),
                ("c", "Add child"),
                ("r", "Rename"),
                ("d", "Remove"),
                ("Esc", "Back"),
            ]),
            (Screen::Categories(_), _) => self.hints(&[
                ("+", "Add"),
                ("r", "Rename"),
                ("d", "Delete"),
                ("Esc", "Back"),
            ]),
            (Screen::Export(_), _) => self.hints(&[
                ("f", "Format"),
                ("r", "Range"),
                ("c", "Custom dates"),
                ("Enter", "Export"),
                ("o", "Open file"),
                ("Esc", "Back"),
            ]),
        }
    }

    fn draw_name_form(&self, frame: &mut Frame, area: Rect, title: &str, form: &NameForm) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![form.build_line("Name"), Line::from("")];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Enter to save • Esc to cancel",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let prefix = "Name: ".len() as u16;
        frame.set_cursor_position((inner.x + prefix + form.value_len() as u16, inner.y));
    }

    fn draw_range_form(&self, frame: &mut Frame, area: Rect, form: &DateRangeForm) {
        let popup_area = centered_rect(60, 40, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default()
            .title("Custom Range")
            .borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        let mut lines = vec![
            form.build_line("Start", DateField::Start),
            form.build_line("End", DateField::End),
            Line::from(""),
        ];
        if let Some(error) = &form.error {
            lines.push(Line::from(Span::styled(
                error.clone(),
                Style::default().fg(Color::Red),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "Dates as YYYY-MM-DD • Tab to switch • Enter to apply",
                Style::default().fg(Color::Gray),
            )));
        }

        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);

        let (cursor_x, cursor_y) = match form.active {
            DateField::Start => (
                inner.x + "Start: ".len() as u16 + form.value_len(DateField::Start) as u16,
                inner.y,
            ),
            DateField::End => (
                inner.x + "End: ".len() as u16 + form.value_len(DateField::End) as u16,
                inner.y + 1,
            ),
        };
        frame.set_cursor_position((cursor_x, cursor_y));
    }

    fn draw_confirm(&self, frame: &mut Frame, area: Rect, title: &str, mut lines: Vec<Line>) {
        let popup_area = centered_rect(60, 30, area);
        frame.render_widget(Clear, popup_area);

        let block = Block::default().title(title).borders(Borders::ALL);
        frame.render_widget(block.clone(), popup_area);
        let inner = block.inner(popup_area);

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Press Y to confirm or N / Esc to cancel.",
            Style::default().fg(Color::Gray),
        )));

        let paragraph = Paragraph::new(lines)
            .alignment(Alignment::Left)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, inner);
    }

    fn palette(&self) -> Palette {
        Palette::for_theme(self.theme)
    }

    fn set_status<S: Into<String>>(&mut self, text: S, kind: StatusKind) {
        self.status = Some(StatusMessage {
            text: text.into(),
            kind,
        });
    }

    fn clear_status(&mut self) {
        self.status = None;
    }

    /// Jump to the neighbouring top-level tab, loading it fresh.
    fn switch_tab(&mut self, offset: isize) -> Result<()> {
        let len = Tab::ALL.len() as isize;
        let idx = (self.screen.tab().index() as isize + offset).rem_euclid(len) as usize;
        self.clear_status();
        self.open_tab(Tab::ALL[idx])
    }

    fn open_tab(&mut self, tab: Tab) -> Result<()> {
        self.screen = match tab {
            Tab::Rate => Screen::Rate(RateScreen::load(&self.conn, self.today)?),
            Tab::Insights => Screen::Insights(InsightsScreen::load(&self.conn, self.today)?),
            Tab::History => Screen::History(HistoryScreen::load(&self.conn)?),
            Tab::Settings => Screen::Settings(SettingsScreen::load(&self.conn)?),
        };
        Ok(())
    }

    fn open_rate_on(&mut self, date: NaiveDate) -> Result<()> {
        self.screen = Screen::Rate(RateScreen::load(&self.conn, date)?);
        self.clear_status();
        Ok(())
    }

    fn rate_selected(&mut self, value: RatingValue) -> Result<()> {
        let Screen::Rate(rate) = &mut self.screen else {
            return Ok(());
        };
        let target = rate
            .current_member()
            .map(|m| m.id)
            .zip(rate.current_category().map(|c| (c.id, c.name.clone())));
        let Some((member_id, (category_id, category_name))) = target else {
            self.set_status("Nothing to rate.", StatusKind::Error);
            return Ok(());
        };

        save_rating(&self.conn, category_id, member_id, rate.date, value)?;
        rate.refresh(&self.conn)?;
        rate.move_selection(1);
        self.set_status(format!("{category_name}: {value}"), StatusKind::Info);
        Ok(())
    }

    fn clear_selected(&mut self) -> Result<()> {
        let Screen::Rate(rate) = &mut self.screen else {
            return Ok(());
        };
        let target = rate.current_member().map(|m| m.id).zip(
            rate.current_category()
                .filter(|c| rate.value_for(c.id).is_some())
                .map(|c| (c.id, c.name.clone())),
        );
        let Some((member_id, (category_id, category_name))) = target else {
            self.set_status("Nothing to clear.", StatusKind::Info);
            return Ok(());
        };

        delete_rating(&self.conn, category_id, member_id, rate.date)?;
        rate.refresh(&self.conn)?;
        self.set_status(format!("Cleared {category_name}."), StatusKind::Info);
        Ok(())
    }

    fn save_name(&mut self, target: &NameTarget, form: &NameForm) -> Result<()> {
        let name = form.parse_input()?;
        match *target {
            NameTarget::NewMember(relationship) => {
                let member = add_member(&self.conn, &name, relationship)?;
                self.refresh_family(Some(member.id))?;
                self.set_status(format!("Added {}.", member.name), StatusKind::Info);
            }
            NameTarget::Member(id) => {
                rename_member(&self.conn, id, &name)?;
                self.refresh_family(Some(id))?;
                self.set_status(format!("Renamed to {name}."), StatusKind::Info);
            }
            NameTarget::NewCategory => {
                let category = add_category(&self.conn, &name)?;
                self.refresh_categories(Some(category.id))?;
                self.set_status(format!("Added {}.", category.name), StatusKind::Info);
            }
            NameTarget::Category(id) => {
                rename_category(&self.conn, id, &name)?;
                self.refresh_categories(Some(id))?;
                self.set_status(format!("Renamed to {name}."), StatusKind::Info);
            }
        }
        Ok(())
    }

    fn perform_member_delete(&mut self, confirm: &ConfirmMemberDelete) -> Result<()> {
        delete_member(&self.conn, confirm.id)?;
        self.refresh_family(None)?;
        self.set_status(format!("Removed {}.", confirm.name), StatusKind::Info);
        Ok(())
    }

    fn perform_category_delete(&mut self, confirm: &ConfirmCategoryDelete) -> Result<()> {
        delete_category(&self.conn, confirm.id)?;
        self.refresh_categories(None)?;
        self.set_status(format!("Deleted {}.", confirm.name), StatusKind::Info);
        Ok(())
    }

    fn apply_custom_range(&mut self, form: &DateRangeForm) -> Result<()> {
        let (start, end) = form.parse_inputs()?;
        let range = ExportRange::Custom { start, end };
        range.resolve(self.today)?;
        if let Screen::Export(export) = &mut self.screen {
            export.range = range;
        }
        self.set_status(format!("Range set to {}.", range.label()), StatusKind::Info);
        Ok(())
    }

    fn perform_export(&mut self) -> Result<()> {
        let Screen::Export(export) = &mut self.screen else {
            return Ok(());
        };
        let outcome = export_to_file(
            &self.conn,
            &self.config.export_dir(),
            export.format,
            export.range,
            self.today,
        )?;
        let message = format!(
            "Exported {} ratings to {}.",
            outcome.rows,
            outcome.path.display()
        );
        export.last_export = Some(outcome);
        self.set_status(message, StatusKind::Info);
        Ok(())
    }

    fn refresh_family(&mut self, focus_id: Option<i64>) -> Result<()> {
        if let Screen::Family(family) = &mut self.screen {
            family.refresh(&self.conn, focus_id)?;
        }
        Ok(())
    }

    fn refresh_categories(&mut self, focus_id: Option<i64>) -> Result<()> {
        if let Screen::Categories(categories) = &mut self.screen {
            categories.refresh(&self.conn, focus_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fetch_active_categories, fetch_rating, fetch_self, open_in_memory};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn app(today: NaiveDate) -> (App, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_in_memory().expect("db");
        let app = App::new(conn, AppConfig::with_data_dir(dir.path()), today).expect("app");
        (app, dir)
    }

    fn press(app: &mut App, keys: &str) {
        for ch in keys.chars() {
            app.handle_key(KeyCode::Char(ch)).unwrap();
        }
    }

    #[test]
    fn number_keys_rate_and_advance() {
        let today = date(2024, 5, 1);
        let (mut app, _dir) = app(today);
        press(&mut app, "3");

        let me = fetch_self(&app.conn).unwrap().unwrap();
        let overall = fetch_active_categories(&app.conn).unwrap().remove(0);
        let stored = fetch_rating(&app.conn, today, me.id, overall.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.value, RatingValue::Positive);
        match &app.screen {
            Screen::Rate(rate) => assert_eq!(rate.selected, 1),
            _ => panic!("expected rate screen"),
        }

        app.handle_key(KeyCode::Up).unwrap();
        press(&mut app, "0");
        assert!(fetch_rating(&app.conn, today, me.id, overall.id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn future_days_are_refused() {
        let today = date(2024, 5, 1);
        let (mut app, _dir) = app(today);
        app.handle_key(KeyCode::Right).unwrap();
        match &app.screen {
            Screen::Rate(rate) => assert_eq!(rate.date, today),
            _ => panic!("expected rate screen"),
        }
        assert!(matches!(
            app.status.as_ref().map(|s| &s.kind),
            Some(StatusKind::Error)
        ));

        app.handle_key(KeyCode::Left).unwrap();
        match &app.screen {
            Screen::Rate(rate) => assert_eq!(rate.date, date(2024, 4, 30)),
            _ => panic!("expected rate screen"),
        }
    }

    #[test]
    fn brackets_cycle_tabs_and_q_quits() {
        let (mut app, _dir) = app(date(2024, 5, 1));
        press(&mut app, "]");
        assert_eq!(app.screen.tab(), Tab::Insights);
        press(&mut app, "[[");
        assert_eq!(app.screen.tab(), Tab::Settings);
        assert!(app.handle_key(KeyCode::Char('q')).unwrap());
    }

    #[test]
    fn insights_stay_locked_without_enough_days() {
        let (mut app, _dir) = app(date(2024, 5, 1));
        press(&mut app, "]");
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.screen, Screen::Insights(_)));
        assert!(matches!(
            app.status.as_ref().map(|s| &s.kind),
            Some(StatusKind::Error)
        ));
    }

    #[test]
    fn adding_a_spouse_through_the_form() {
        let (mut app, _dir) = app(date(2024, 5, 1));
        app.open_tab(Tab::Settings).unwrap();
        app.handle_key(KeyCode::Down).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.screen, Screen::Family(_)));

        press(&mut app, "s");
        assert!(matches!(app.mode, Mode::EditingName { .. }));
        press(&mut app, "Alex");
        app.handle_key(KeyCode::Enter).unwrap();
        assert!(matches!(app.mode, Mode::Normal));

        match &app.screen {
            Screen::Family(family) => {
                assert_eq!(family.members.len(), 2);
                assert_eq!(family.current_member().unwrap().name, "Alex");
            }
            _ => panic!("expected family screen"),
        }

        press(&mut app, "s");
        assert!(matches!(app.mode, Mode::Normal));
    }

    #[test]
    fn theme_cycles_and_persists() {
        let (mut app, _dir) = app(date(2024, 5, 1));
        app.open_tab(Tab::Settings).unwrap();
        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(app.theme, ThemeMode::Light);
        assert_eq!(fetch_theme_mode(&app.conn).unwrap(), ThemeMode::Light);
    }

    #[test]
    fn export_reports_empty_selection_in_footer() {
        let (mut app, dir) = app(date(2024, 5, 1));
        app.screen = Screen::Export(ExportScreen::default());
        app.handle_key(KeyCode::Enter).unwrap();
        assert_eq!(
            app.status.as_ref().map(|s| s.text.as_str()),
            Some(crate::export::NO_DATA_MESSAGE)
        );

        app.open_tab(Tab::Rate).unwrap();
        press(&mut app, "2");
        app.screen = Screen::Export(ExportScreen::default());
        app.handle_key(KeyCode::Enter).unwrap();
        let exported = dir.path().join("exports").join("dayrater_export_2024-05-01.csv");
        assert!(exported.exists());
    }
}
