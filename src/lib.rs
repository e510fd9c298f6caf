//! hnav - keyboard navigation for Hacker News threads
//!
//! Vim-style traversal over comments and stories with an activity trail
//! (favorites and flags) kept in sync with a remote store.

pub mod activity;
pub mod adapters;
pub mod app;
pub mod backoff;
pub mod config;
pub mod domain;
pub mod keyboard;
pub mod keymap;
pub mod logging;
pub mod ports;
pub mod traversal;
pub mod ui;
