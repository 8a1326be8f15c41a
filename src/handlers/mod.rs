//! HTTP 处理器模块

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod report;
pub mod upload;
