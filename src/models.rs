//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI. These stay light-weight data holders so the other layers can focus on
//! presentation, aggregation, and persistence logic.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

use crate::error::StoreError;

/// Store an enum as its upper-case name and decode it back on read.
macro_rules! sql_text_enum {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|err: StoreError| FromSqlError::Other(Box::new(err)))
            }
        }
    };
}

/// The three ordinal moods a category can receive for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RatingValue {
    Negative,
    Neutral,
    Positive,
}

impl RatingValue {
    pub const ALL: [RatingValue; 3] = [
        RatingValue::Negative,
        RatingValue::Neutral,
        RatingValue::Positive,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            RatingValue::Negative => "😢",
            RatingValue::Neutral => "😐",
            RatingValue::Positive => "😊",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RatingValue::Negative => "Sad",
            RatingValue::Neutral => "Neutral",
            RatingValue::Positive => "Happy",
        }
    }

    /// Numeric score used by every average: 1 for negative up to 3 for positive.
    pub fn score(self) -> u8 {
        match self {
            RatingValue::Negative => 1,
            RatingValue::Neutral => 2,
            RatingValue::Positive => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RatingValue::Negative => "NEGATIVE",
            RatingValue::Neutral => "NEUTRAL",
            RatingValue::Positive => "POSITIVE",
        }
    }
}

impl FromStr for RatingValue {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEGATIVE" => Ok(RatingValue::Negative),
            "NEUTRAL" => Ok(RatingValue::Neutral),
            "POSITIVE" => Ok(RatingValue::Positive),
            other => Err(StoreError::Decode {
                kind: "rating",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for RatingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

sql_text_enum!(RatingValue);

/// How a family member relates to the person keeping the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    SelfMember,
    Spouse,
    Child,
}

impl RelationshipType {
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipType::SelfMember => "SELF",
            RelationshipType::Spouse => "SPOUSE",
            RelationshipType::Child => "CHILD",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RelationshipType::SelfMember => "Me",
            RelationshipType::Spouse => "Spouse",
            RelationshipType::Child => "Child",
        }
    }

    /// Category kind created alongside a member of this relationship, if any.
    pub fn category_kind(self) -> Option<CategoryKind> {
        match self {
            RelationshipType::SelfMember => None,
            RelationshipType::Spouse => Some(CategoryKind::Spouse),
            RelationshipType::Child => Some(CategoryKind::Child),
        }
    }
}

impl FromStr for RelationshipType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELF" => Ok(RelationshipType::SelfMember),
            "SPOUSE" => Ok(RelationshipType::Spouse),
            "CHILD" => Ok(RelationshipType::Child),
            other => Err(StoreError::Decode {
                kind: "relationship",
                value: other.to_string(),
            }),
        }
    }
}

sql_text_enum!(RelationshipType);

/// Where a category came from: built-in, tied to a family member, or user-made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    Default,
    Spouse,
    Child,
    Custom,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryKind::Default => "DEFAULT",
            CategoryKind::Spouse => "SPOUSE",
            CategoryKind::Child => "CHILD",
            CategoryKind::Custom => "CUSTOM",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CategoryKind::Default => "Built-in",
            CategoryKind::Spouse => "Spouse",
            CategoryKind::Child => "Child",
            CategoryKind::Custom => "Custom",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEFAULT" => Ok(CategoryKind::Default),
            "SPOUSE" => Ok(CategoryKind::Spouse),
            "CHILD" => Ok(CategoryKind::Child),
            "CUSTOM" => Ok(CategoryKind::Custom),
            other => Err(StoreError::Decode {
                kind: "category kind",
                value: other.to_string(),
            }),
        }
    }
}

sql_text_enum!(CategoryKind);

/// Colour scheme preference persisted in the `settings` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::System => "SYSTEM",
            ThemeMode::Light => "LIGHT",
            ThemeMode::Dark => "DARK",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::System => "System default",
            ThemeMode::Light => "Light",
            ThemeMode::Dark => "Dark",
        }
    }

    /// Next option in the settings cycle.
    pub fn next(self) -> Self {
        match self {
            ThemeMode::System => ThemeMode::Light,
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::System,
        }
    }
}

impl FromStr for ThemeMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SYSTEM" => Ok(ThemeMode::System),
            "LIGHT" => Ok(ThemeMode::Light),
            "DARK" => Ok(ThemeMode::Dark),
            other => Err(StoreError::Decode {
                kind: "theme mode",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A person whose day (or whose interactions with the user) can be rated.
pub struct FamilyMember {
    pub id: i64,
    pub name: String,
    pub relationship: RelationshipType,
    /// Lower values sort first; new members are appended in steps of ten.
    pub display_order: i64,
    /// Soft-delete flag. Inactive members keep their rating history.
    pub is_active: bool,
    /// Unix milliseconds.
    pub created_at: i64,
}

impl FamilyMember {
    pub fn is_self(&self) -> bool {
        self.relationship == RelationshipType::SelfMember
    }

    pub fn is_spouse(&self) -> bool {
        self.relationship == RelationshipType::Spouse
    }

    /// The journal owner can never be removed.
    pub fn can_delete(&self) -> bool {
        !self.is_self()
    }
}

impl fmt::Display for FamilyMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A ratable dimension of a day such as "Overall Day".
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: CategoryKind,
    /// Owning member for spouse/child interaction categories.
    pub family_member_id: Option<i64>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: i64,
}

impl Category {
    /// Only user-made categories are deleted directly; member categories follow
    /// their member and built-ins stay forever.
    pub fn can_delete(&self) -> bool {
        self.kind == CategoryKind::Custom
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Raw `daily_ratings` row.
pub struct DailyRating {
    pub id: i64,
    pub date: NaiveDate,
    pub family_member_id: i64,
    /// Becomes `None` if the category row is ever hard-deleted.
    pub category_id: Option<i64>,
    pub value: RatingValue,
    /// Unix milliseconds of the last upsert.
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
/// A rating resolved against its (active) category for display.
pub struct Rating {
    pub category_id: i64,
    pub category_name: String,
    pub value: RatingValue,
}

#[derive(Debug, Clone, PartialEq)]
/// Everything one family member rated on one date.
pub struct DayRatings {
    pub date: NaiveDate,
    pub member: FamilyMember,
    pub ratings: Vec<Rating>,
}

impl DayRatings {
    pub fn has_ratings(&self) -> bool {
        !self.ratings.is_empty()
    }

    pub fn rated_count(&self) -> usize {
        self.ratings.len()
    }

    pub fn rating_for(&self, category_id: i64) -> Option<&Rating> {
        self.ratings.iter().find(|r| r.category_id == category_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Rating row joined with the (possibly missing) category name. Feeds the
/// weekly, monthly, and statistics aggregations.
pub struct RatingWithCategory {
    pub id: i64,
    pub date: NaiveDate,
    pub family_member_id: i64,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub value: RatingValue,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedRating {
    pub date: NaiveDate,
    pub value: RatingValue,
}
