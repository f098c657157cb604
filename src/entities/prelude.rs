pub use super::api_keys::Entity as ApiKeys;
pub use super::bloggers::Entity as Bloggers;
pub use super::notes::Entity as Notes;
pub use super::user_settings::Entity as UserSettings;
pub use super::users::Entity as Users;
