pub mod browser;
pub mod config;
pub mod menu;
pub mod render;
pub mod terminal;

pub use menu::{Finish, MenuLoop, State};

