pub mod entities;
pub mod errors;
pub mod policy;
pub mod session;
