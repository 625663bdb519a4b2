//! The web module for handling the plugin HTTP endpoint.
//! This file declares the other files in this directory as sub-modules.

pub mod api;
pub mod auth;
