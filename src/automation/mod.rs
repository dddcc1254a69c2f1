pub mod enforcer;
pub mod matcher;
pub mod queue;
