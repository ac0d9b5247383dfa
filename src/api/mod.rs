pub mod attendance;
pub mod class;
pub mod report;
pub mod school;
pub mod student;
pub mod user;
