// tests/integration/main.rs

mod helpers;

mod services;
mod incidents;
mod public;
mod events;
