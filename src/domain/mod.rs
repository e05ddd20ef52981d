pub mod clock;
pub mod display;
pub mod entity;
pub mod error;
pub mod repository;
