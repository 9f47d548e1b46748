pub mod core;
pub mod form;
pub mod setup;
pub mod students;
pub mod wizard;
