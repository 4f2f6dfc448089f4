//! Wakili client library exports.

pub mod agent;
pub mod auth;
pub mod config;
pub mod error;
pub mod export;
pub mod mediator;
pub mod notifications;
pub mod page;
pub mod proxy;
pub mod session;
pub mod telemetry;
pub mod views;
