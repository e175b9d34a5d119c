pub mod chat;
pub mod profile;
pub mod saved;
pub mod theme;
pub mod webhook;
