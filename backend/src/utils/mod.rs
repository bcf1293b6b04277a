pub mod messages;
pub mod tags;
