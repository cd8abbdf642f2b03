pub mod campaigns;
pub mod config;
pub mod security;
pub mod shared;
pub mod webhooks;
