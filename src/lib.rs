//! 交易报表服务库
//! 认证、会话、文件上传、报表处理流程与审计

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod processing;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
