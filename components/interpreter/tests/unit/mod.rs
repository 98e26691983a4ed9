//! Unit tests for interpreter components

mod common;
mod test_control_flow;
