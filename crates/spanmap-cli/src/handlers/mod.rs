pub mod compile;
pub mod info;
pub mod process;
pub mod validate;
