pub mod cell;
pub mod compaction;
pub mod grid;
pub mod worker;
