pub mod collaborators;
pub mod config;
pub mod displays;
pub mod dry_run;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod matcher;
pub mod platform;
pub mod scheduler;
pub mod selector;
pub mod video;
pub mod tasks {
    pub mod engine;
}

pub use rule_model;
