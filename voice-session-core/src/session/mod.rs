pub mod engine;
pub mod state_machine;
