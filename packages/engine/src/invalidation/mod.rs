// Invalidation Module
//
// Turns API changes into the transitive set of classes that must be
// recompiled, and maps that set back onto sources.

pub mod api;
pub mod api_changes;
pub mod invalidator;

#[cfg(test)]
mod test;

// Re-exports
pub use api::ApiChange;
pub use api_changes::{api_changes, single_api_change};
pub use invalidator::Invalidator;
