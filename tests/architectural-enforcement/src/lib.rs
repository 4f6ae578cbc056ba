//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - The engine core stays synchronous and I/O-free (runtime work lives in the driver)
//! - Production code propagates errors instead of panicking
//! - No blocking thread primitives anywhere in the workspace
//!
//! These tests are designed to catch violations early in the development cycle.

#![allow(dead_code)]

pub fn placeholder() {
    // Placeholder to make this a valid library
}
