pub mod common;
pub mod menu;
pub mod role;
pub mod security_level;
pub mod user;

pub use common::*;
pub use menu::*;
pub use role::*;
pub use security_level::*;
pub use user::*;
