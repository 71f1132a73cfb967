pub mod aggregate;
pub mod db;
pub mod gemini;
pub mod models;
pub mod recognition;
pub mod reference;
pub mod service;
pub mod store;
