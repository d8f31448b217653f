pub mod authority;
pub mod event;
pub mod snapshot;
