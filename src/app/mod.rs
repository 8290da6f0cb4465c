//! Application layer built on the Event/Command boundary.

pub mod notes_api;

pub use notes_api::NotesApi;
