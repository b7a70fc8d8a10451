//! Cabinet - a terminal arcade machine for Lua games
//!
//! This library provides the core functionality for the cabinet host,
//! including game discovery, the plugin lifecycle state machine, the shared
//! drawable scene and the embedded Lua loader.
//!
//! # Modules
//!
//! - [`config`]: Configuration management and serialization
//! - [`host`]: Main host logic and frame loop
//! - [`catalog`]: Game discovery and validation
//! - [`lifecycle`]: Plugin lifecycle, fault containment and teardown
//! - [`script`]: Code loading, the embedded Lua state and the game API
//! - [`scene`]: Shared drawable-object scene and terminal rasterizer
//! - [`ui`]: Front-end components (game carousel, FPS readout)
//! - [`input`]: Keyboard state and named keybinds

pub mod catalog;
pub mod config;
pub mod host;
pub mod input;
pub mod lifecycle;
pub mod scene;
pub mod script;
pub mod ui;
