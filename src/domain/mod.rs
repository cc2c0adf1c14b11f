// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the core concepts:
// what a parsed row is, which columns exist and in what order,
// and the abstractions the other layers implement.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or network calls
//   - Only plain structs, enums, constants and traits

/// One structured row parsed from a log line
pub mod record;

/// Column groups and the expected-insulation weight table
pub mod schema;

/// Core abstractions (traits) that other layers implement
pub mod traits;

/// Metadata written next to every persisted model
pub mod artifact;
