pub mod messagable;
pub mod message;
pub mod thread;
