pub mod actions;
pub mod apps;
pub mod health;
pub mod tree;
