//! Warden Core — domain models, repository traits, error types and the
//! access evaluation shared by the server and the dashboard client.

pub mod access;
pub mod error;
pub mod models;
pub mod navigation;
pub mod repository;
