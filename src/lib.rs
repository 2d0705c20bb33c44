//! Medlens backend: authentication, consent, image prediction proxy with
//! education enrichment, and retrieval-augmented chat.

pub mod config;
pub mod core;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod startup;
