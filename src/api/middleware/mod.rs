//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Auth validator: token lookup and role resolution
//! 2. Audit logger: logs after auth, has the account id

pub mod audit;
pub mod auth;
