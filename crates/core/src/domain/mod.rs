pub mod appointment;
pub mod booking;
pub mod service;
pub mod slot;
