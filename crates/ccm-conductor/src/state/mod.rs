pub mod machine;
pub mod persist;
