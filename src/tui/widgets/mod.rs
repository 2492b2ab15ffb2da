//! Reusable UI pieces

pub mod shortcuts;
