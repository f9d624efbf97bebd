pub mod chat;
pub mod inventory;
pub mod onboard;
pub mod serve;
