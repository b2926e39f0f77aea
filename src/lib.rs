// Library entry point for deskfolio
// Exposes modules for testing

pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod desktop;
pub mod events;
pub mod models;
pub mod repos;
pub mod store;
pub mod uploads;
