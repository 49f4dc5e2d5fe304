//! Data models for Huddle

mod user;
mod group;
mod membership;
mod task;
mod invite;
mod nudge;

pub use user::*;
pub use group::*;
pub use membership::*;
pub use task::*;
pub use invite::*;
pub use nudge::*;
