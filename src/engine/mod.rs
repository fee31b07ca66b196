pub mod autosave;
pub mod defaults;
pub mod path;
pub mod validate;
pub mod visibility;
