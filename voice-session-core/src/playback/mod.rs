pub mod completion;
pub mod queue;
pub mod scheduler;
