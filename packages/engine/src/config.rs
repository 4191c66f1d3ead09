// Engine Configuration
//
// The recognized incremental-compilation settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncOptions {
    /// Fraction of all sources beyond which an invalidation widens to a
    /// full recompile.
    pub recompile_all_fraction: f64,
    /// Cycle count after which invalidation switches to the brute-force
    /// member-reference closure.
    pub transitive_step: u32,
    /// Recompile every user of a macro-providing class on any change.
    pub recompile_on_macro_def: bool,
    /// Propagate sealed-hierarchy changes through pattern-target scope
    /// only.
    pub use_optimized_sealed: bool,
    /// Skip the classpath lookup when judging library changes; only the
    /// library stamp is consulted.
    pub skip_classpath_lookup: bool,
    pub relations_debug: bool,
    /// Store full APIs instead of minimized ones.
    pub api_debug: bool,
    pub strict_mode: bool,
    /// Context lines when rendering API diffs. Diagnostic only.
    pub api_diff_context_size: usize,
}

impl Default for IncOptions {
    fn default() -> IncOptions {
        IncOptions {
            recompile_all_fraction: 0.5,
            transitive_step: 3,
            recompile_on_macro_def: true,
            use_optimized_sealed: false,
            skip_classpath_lookup: false,
            relations_debug: false,
            api_debug: false,
            strict_mode: false,
            api_diff_context_size: 5,
        }
    }
}

impl IncOptions {
    /// Clamps out-of-range settings instead of failing.
    pub fn normalized(mut self) -> IncOptions {
        self.recompile_all_fraction = self.recompile_all_fraction.clamp(0.0, 1.0);
        self
    }
}
