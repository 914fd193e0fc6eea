pub mod characters;
pub mod core;
pub mod export;
pub mod import;
pub mod search;
pub mod setup;
pub mod towns;
