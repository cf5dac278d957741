pub mod entity;
pub mod policy;
pub mod viewport;
