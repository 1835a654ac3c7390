pub mod common;
pub mod doctor;
pub mod list;
pub mod post;
pub mod watch;
