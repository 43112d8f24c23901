pub mod chore;
pub mod expense;
pub mod group;
pub mod notification;
pub mod preferences;
pub mod realtime;
