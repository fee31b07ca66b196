pub mod flatten;
pub mod keys;
