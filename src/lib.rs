//! Cross-runtime garbage collection bridge.
//!
//! Links a tracing ("managed") collector to a host execution environment that
//! runs its own independent collector and its own reference model. Application
//! objects may have a live peer in each runtime and reference cycles may span
//! both heaps; neither collector alone can decide liveness. Once per managed
//! collection cycle the managed collector hands this crate the strongly
//! connected components of all bridge objects plus the cross-component edges,
//! and [`Bridge::process_cross_references`](bridge::Bridge::process_cross_references)
//! mirrors that graph into the host heap, runs one host collection, and reads
//! the verdict back.

macro_rules! logln_if {
    ($cond: expr, $($t:tt)*) => {
        if $cond {
            println!($($t)*);
        }
    };
}

/// Abort the process with a message when `cond` does not hold.
///
/// A bridge pass mutates reference state in two foreign object models at once;
/// there is no consistent state to unwind to once an invariant breaks mid-pass.
macro_rules! abort_unless {
    ($cond: expr, $($t:tt)*) => {
        if !$cond {
            eprintln!($($t)*);
            std::process::abort();
        }
    };
}

pub mod bridge;
pub mod counters;
pub mod host;
pub mod managed;
pub mod peer;
pub mod processing;
pub mod reflog;
pub mod registry;
pub mod xref;


pub use bridge::Bridge;
pub use xref::{CrossReference, SccRecord};

/// Configuration for the bridge.
#[derive(Clone)]
pub struct Config {
    /// Enables verbose printing of bridge passes.
    pub verbose: bool,
    /// Mirror reference-kind events to stderr in addition to any sink installed
    /// with [`Bridge::log_refs_to`](bridge::Bridge::log_refs_to).
    pub refs_to_console: bool,
    /// Capture a call-stack snippet on every reference-kind event. Slow; meant
    /// for chasing reference leaks, not for production.
    pub log_ref_stacks: bool,
    /// Upper bound of strong host references the embedder budgets for. Only
    /// used to derive [`Config::gc_threshold`].
    pub max_strong_refs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose: false,
            refs_to_console: false,
            log_ref_stacks: false,
            max_strong_refs: 51200,
        }
    }
}

impl Config {
    /// Strong-reference count at which the embedder should start forcing
    /// collections: 90% of the configured maximum.
    pub fn gc_threshold(&self) -> usize {
        (self.max_strong_refs as f64 * 0.9) as usize
    }
}
