//! View models

mod group_screen;

pub use group_screen::GroupScreen;
