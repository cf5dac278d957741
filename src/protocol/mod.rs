pub mod cipher;
pub mod compression;
pub mod constants;
pub mod cursor;
pub mod frames;
