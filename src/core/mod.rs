// src/core/mod.rs
//! Storage layer: pool, row models, per-table repositories and the match service

pub mod database;
pub mod match_service;
pub mod models;
pub mod repositories;

pub use database::Database;
pub use match_service::MatchService;
