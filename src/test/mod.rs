pub mod utils;

mod admin;
mod progress;
