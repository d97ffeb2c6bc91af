pub mod claims;
pub mod course;
pub mod entity;
