//! Core模块 - 包含所有核心业务逻辑

pub mod models;
pub mod error;
pub mod store;
pub mod grading;
pub mod catalog;
pub mod prerequisites;
pub mod enrollment;
pub mod reports;
