pub mod application;
pub mod browse;
pub mod nearby;
pub mod watch;
