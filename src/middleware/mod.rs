pub mod auth;
pub mod hosts;
pub mod role;
