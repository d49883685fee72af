// src/lib.rs

pub mod auth;
pub mod config;
pub mod events;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod status_service;
pub mod sync;
pub mod web;
