// src/models/mod.rs

pub mod answer;
pub mod quiz;
pub mod session;
