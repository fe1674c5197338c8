pub mod user;
pub mod activity;
pub mod aggregate;

pub use user::*;
pub use activity::*;
pub use aggregate::*;
