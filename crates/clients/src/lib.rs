pub mod catalog;
pub mod overseerr;
