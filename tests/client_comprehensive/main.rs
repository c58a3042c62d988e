//! Client Comprehensive Test Suite
//!
//! Cross-crate tests of the client against the built-in engine, one module
//! per observable guarantee of the store.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test client_comprehensive
//! ```

mod test_utils;

// Marshalling
mod value_round_trip;

// Locking
mod mutual_exclusion;

// Notifications and caching
mod cache_staleness;
mod notification_coalescing;

// Row lifecycle and memory
mod deletion;
mod steady_state_memory;

// Contexts and write modes
mod buffered_commit;
mod cross_context_visibility;
