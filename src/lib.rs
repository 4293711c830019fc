// src/lib.rs

//! Adaptive Catalog Harvester Library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
