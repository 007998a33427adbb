//! Persistence module split across logical submodules. Every public function
//! wraps one query (or one small transaction) against the embedded SQLite
//! store so the rest of the crate can stay focused on aggregation and UI.

mod categories;
mod connection;
mod family;
mod ratings;
mod settings;

pub use categories::{
    add_category, delete_category, fetch_active_categories, fetch_all_categories,
    fetch_category, fetch_category_for_member, rename_category, restore_category,
};
pub use connection::{open_database, open_in_memory, DEFAULT_CATEGORIES};
pub use family::{
    add_member, delete_member, ensure_self, fetch_active_members, fetch_all_members,
    fetch_children, fetch_member, fetch_self, fetch_spouse, has_spouse,
    interaction_category_name, rename_member, restore_member,
};
pub use ratings::{
    count_rated_days, delete_rating, fetch_all_day_ratings, fetch_category_history,
    fetch_day_ratings, fetch_overall_ratings_in_range, fetch_rated_dates,
    fetch_rated_dates_in_month, fetch_rating, fetch_rating_distribution,
    fetch_ratings_for_export, fetch_ratings_in_range, fetch_ratings_through, save_rating,
};
pub use settings::{fetch_theme_mode, save_theme_mode};
