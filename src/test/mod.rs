pub mod utils;

mod appointments;
mod auth;
mod programs;
mod workouts;
