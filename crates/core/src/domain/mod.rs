pub mod message;
pub mod recommendation;
pub mod tables;
pub mod window;
