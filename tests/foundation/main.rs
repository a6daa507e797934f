//! Integration tests for Layer 1: Foundation
//!
//! Tests for core types: Value, ValueStream and ActionError.

mod errors;
mod streams;
mod values;
