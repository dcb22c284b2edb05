// Library root for the pet club service

pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod core;
pub mod notify;
pub mod repository;
pub mod state;
pub mod storage;
