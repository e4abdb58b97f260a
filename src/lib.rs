// Library root
// -----------
// This crate exposes a small library surface for the `to-do` CLI. The
// binary (`main.rs`) wires these modules together.
//
// Module responsibilities:
// - `auth` / `callback`: obtain an OAuth2 token, from disk, by refresh, or
//   through the browser-based authorization-code flow.
// - `config`: settings file location and owner-only persistence.
// - `api`: one authenticated JSON request/response cycle per call.
// - `task`: the task resource as the service serializes it.
// - `commands` / `ui`: command table, handlers and terminal rendering.
pub mod api;
pub mod auth;
pub mod callback;
pub mod commands;
pub mod config;
pub mod error;
pub mod task;
pub mod ui;

pub use error::{Error, Result};
