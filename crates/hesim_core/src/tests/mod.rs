//! Integration tests for the fund simulation engine
//!
//! Tests are organized by topic:
//! - `scenarios` - Deterministic end-to-end paths with hand-checked numbers
//! - `determinism` - Seeded reproducibility of paths and Monte Carlo runs
//! - `price_paths` - Zone correlation and suburb co-movement
//! - `exits` - Exit window and once-per-loan guarantees
//! - `reinvestment` - Recycling exit proceeds through a policy
//! - `monte_carlo` - Retries, failures and cancellation
//! - `builder_dsl` - Builder DSL for fluent configuration

mod builder_dsl;
mod determinism;
mod exits;
mod monte_carlo;
