//! Storage模块 - SQLite持久化与配置

pub mod config;
pub mod database;
