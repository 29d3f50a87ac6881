pub mod admin;
pub mod attendance;
pub mod calendar;
pub mod core;
pub mod enrollment;
pub mod marks;
pub mod offerings;
