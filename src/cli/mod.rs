pub mod app;
pub mod commands;
pub mod context;
pub mod demo;
pub mod dispatch;
pub mod env;
pub mod filters;
pub mod output;
pub mod panel;
pub mod runtime;
