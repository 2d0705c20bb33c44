//! HTTP handlers grouped by resource.

pub mod assessments;
pub mod auth;
pub mod chat;
pub mod consent;
pub mod education;
