pub mod command;
pub mod config;
pub mod frame_loop;
pub mod runner;
