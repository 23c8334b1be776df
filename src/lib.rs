pub mod config;
pub mod joystick;
