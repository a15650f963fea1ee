pub mod command;
pub mod config;
pub mod deepl;
pub mod error;
pub mod ignore_tags;
pub mod languages;
pub mod localization;
pub mod security;
pub mod service;
