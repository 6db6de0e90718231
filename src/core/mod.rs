pub mod account;
pub mod auth;
pub mod chat;
pub mod client;
pub mod http;
pub mod pipeline;
pub mod profile;
pub mod project;
pub mod quest;
pub mod reporter;
pub mod user_agent;
pub mod utils;

#[cfg(test)]
mod mock;
