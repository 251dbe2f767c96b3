pub mod security_attributes;
pub mod session;

pub use security_attributes::*;
pub use session::*;
