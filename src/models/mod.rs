pub mod content;
pub mod identity;
