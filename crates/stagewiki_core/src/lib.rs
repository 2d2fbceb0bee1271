pub mod category;
pub mod compose;
pub mod config;
pub mod error;
pub mod generator;
pub mod guard;
pub mod inference;
pub mod pipeline;
pub mod rules;
pub mod runtime;
pub mod sink;
pub mod substitute;
