//! Property-based tests for window and slot calculations

mod slots;
mod window;
