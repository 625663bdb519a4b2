//! Login plugin for a tunnel host: checks `user` plus the `password` meta of
//! each login against a credential file that can be reloaded while serving.

pub mod config;
pub mod reload;
pub mod service;
pub mod web;
