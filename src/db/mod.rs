pub mod appointments;
pub mod exercises;
pub mod messages;
pub mod notifications;
pub mod nutrition;
pub mod programs;
pub mod stats;
pub mod users;
pub mod workouts;
