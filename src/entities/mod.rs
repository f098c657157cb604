pub mod prelude;

pub mod api_keys;
pub mod bloggers;
pub mod notes;
pub mod user_settings;
pub mod users;
