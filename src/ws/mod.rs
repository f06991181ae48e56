pub mod guard;
pub mod registry;
