//! Contract tests for the interpreter's public surface

mod test_host_contract;
