pub mod help;
pub mod styles;
pub mod thread;
