//! 数据模型模块
//! 用户、角色、会话、审计日志，以及报表视图

pub mod audit;
pub mod auth;
pub mod report;
pub mod role;
pub mod session;
pub mod user;
