pub mod check;
pub mod control;
pub mod exec;
pub mod list;
pub mod options;
