// src/application/mod.rs
//
// Application Layer
//
// Composition root for embedding binaries. Holds no business logic.

pub mod state;

pub use state::AppState;
