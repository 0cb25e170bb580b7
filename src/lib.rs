pub mod analytics;
pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod food;
pub mod nutrition;
pub mod onboarding;
pub mod profile;
pub mod session;
pub mod state;
pub mod water;
pub mod weight;
