#![forbid(unsafe_code)]

pub mod repository;
pub mod settings;
pub mod sqlite;
