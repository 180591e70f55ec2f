//! Storage glue for the command-line tool.

pub mod roster;
