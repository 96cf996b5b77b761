pub mod add;
pub mod archive;
pub mod common;
pub mod conflicts;
pub mod delete;
pub mod edit;
pub mod list;
pub mod queue;
pub mod resolve;
pub mod sync;
