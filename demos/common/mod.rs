pub mod effects;
pub mod stderr_log;
