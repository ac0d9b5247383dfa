pub mod attendance;
pub mod class;
pub mod role;
pub mod school;
pub mod student;
pub mod user;
