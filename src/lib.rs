pub mod audit;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod money;
pub mod notifier;
pub mod payments;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod workflow;
