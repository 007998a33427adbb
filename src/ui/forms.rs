use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Category, FamilyMember, RelationshipType};

/// Longest name accepted by the inline editors.
const MAX_NAME_LEN: usize = 40;
/// `YYYY-MM-DD`.
const DATE_LEN: usize = 10;

/// Single-field form used for adding or renaming members and categories.
#[derive(Default, Clone)]
pub(crate) struct NameForm {
    pub(crate) value: String,
    pub(crate) error: Option<String>,
}

impl NameForm {
    /// Pre-fill the field when renaming.
    pub(crate) fn with_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() || self.value.chars().count() >= MAX_NAME_LEN {
            return false;
        }
        self.value.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.value.pop();
    }

    /// Trimmed, non-empty name ready for the repository.
    pub(crate) fn parse_input(&self) -> Result<String> {
        let name = self.value.trim();
        if name.is_empty() {
            return Err(anyhow!("Name is required."));
        }
        Ok(name.to_string())
    }

    pub(crate) fn build_line(&self, field_name: &str) -> Line<'static> {
        input_line(field_name, &self.value, true)
    }

    pub(crate) fn value_len(&self) -> usize {
        self.value.chars().count()
    }
}

/// Fields of the custom export range form.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum DateField {
    #[default]
    Start,
    End,
}

/// Start/end entry for a custom export range.
#[derive(Default, Clone)]
pub(crate) struct DateRangeForm {
    pub(crate) start: String,
    pub(crate) end: String,
    pub(crate) active: DateField,
    pub(crate) error: Option<String>,
}

impl DateRangeForm {
    pub(crate) fn from_range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            active: DateField::Start,
            error: None,
        }
    }

    pub(crate) fn toggle_field(&mut self) {
        self.active = match self.active {
            DateField::Start => DateField::End,
            DateField::End => DateField::Start,
        };
    }

    fn active_value(&mut self) -> &mut String {
        match self.active {
            DateField::Start => &mut self.start,
            DateField::End => &mut self.end,
        }
    }

    /// Only digits and dashes make it into a date field.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let value = self.active_value();
        if (ch.is_ascii_digit() || ch == '-') && value.len() < DATE_LEN {
            value.push(ch);
            true
        } else {
            false
        }
    }

    pub(crate) fn backspace(&mut self) {
        self.active_value().pop();
    }

    /// Parse both dates. Ordering is checked by the export range itself.
    pub(crate) fn parse_inputs(&self) -> Result<(NaiveDate, NaiveDate)> {
        let start = parse_date("Start date", &self.start)?;
        let end = parse_date("End date", &self.end)?;
        Ok((start, end))
    }

    pub(crate) fn build_line(&self, field_name: &str, field: DateField) -> Line<'static> {
        let value = match field {
            DateField::Start => &self.start,
            DateField::End => &self.end,
        };
        input_line(field_name, value, self.active == field)
    }

    pub(crate) fn value_len(&self, field: DateField) -> usize {
        match field {
            DateField::Start => self.start.len(),
            DateField::End => self.end.len(),
        }
    }
}

fn parse_date(label: &str, raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(anyhow!("{label} is required."));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("{label} must look like 2024-01-31."))
}

fn input_line(field_name: &str, value: &str, is_active: bool) -> Line<'static> {
    let display = if value.is_empty() {
        "<required>".to_string()
    } else {
        value.to_string()
    };

    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else if value.is_empty() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    Line::from(vec![
        Span::raw(format!("{field_name}: ")),
        Span::styled(display, style),
    ])
}

/// What a name form is editing.
#[derive(Clone)]
pub(crate) enum NameTarget {
    NewMember(RelationshipType),
    Member(i64),
    NewCategory,
    Category(i64),
}

impl NameTarget {
    pub(crate) fn title(&self) -> &'static str {
        match self {
            NameTarget::NewMember(RelationshipType::Spouse) => "Add Spouse",
            NameTarget::NewMember(RelationshipType::Child) => "Add Child",
            NameTarget::NewMember(RelationshipType::SelfMember) => "Add Member",
            NameTarget::Member(_) => "Rename Member",
            NameTarget::NewCategory => "Add Category",
            NameTarget::Category(_) => "Rename Category",
        }
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmMemberDelete {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl From<&FamilyMember> for ConfirmMemberDelete {
    fn from(member: &FamilyMember) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmCategoryDelete {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl From<&Category> for ConfirmCategoryDelete {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id,
            name: category.name.clone(),
        }
    }
}
