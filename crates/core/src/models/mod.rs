//! Data models for Citiverse

mod booking;
mod event;
mod hall;
mod records;
mod user;

pub use booking::*;
pub use event::*;
pub use hall::*;
pub use records::*;
pub use user::*;
