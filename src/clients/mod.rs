pub mod auth_center;
