pub mod auth;
pub mod health;
pub mod policy;
pub mod roles;
pub mod security;
