//! Unit tests for bytecode_system components

mod test_builder;
mod test_program;
