mod grant_key;
mod users;

pub use grant_key::cmd_grant_key;
pub use users::cmd_list_users;
