pub mod chores;
pub mod expenses;
pub mod notifications;
pub mod websocket;
