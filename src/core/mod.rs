pub mod chat;
pub mod chat_stream;
pub mod config;
pub mod credentials;
pub mod export;
pub mod message;
pub mod models;
pub mod notice;
pub mod saved_articles;
pub mod session;
pub mod session_store;
pub mod storage;
pub mod thinking;
pub mod time;
