pub mod dates;
pub mod signature;
