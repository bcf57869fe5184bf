pub mod chat;
pub mod confirm;
pub mod health;
