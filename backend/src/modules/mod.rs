pub mod clock;
pub mod database;
pub mod extractors;
pub mod sanitizer;
