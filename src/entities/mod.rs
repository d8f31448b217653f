pub mod item;
pub mod resolver;
