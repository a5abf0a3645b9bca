//! Context snapshot assembly.
//!
//! Builds the layered [`types::ContextSnapshot`] that agents turn into
//! prompts: the immediate layer around the cursor, the project layer from
//! the workspace tree, the historical layer from version control, and an
//! external layer left empty unless an advisory service fills it in.

pub mod cache;
pub mod engine;
pub mod history;
pub mod immediate;
pub mod project;
pub mod types;


pub use engine::ContextEngine;
pub use types::ContextSnapshot;
