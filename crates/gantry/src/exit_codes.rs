//! Exit codes for the CLI

#![allow(dead_code)]

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// The backend reported a build failure
pub const BUILD_FAILED: i32 = 3;

/// No workspace snapshot was found
pub const NO_WORKSPACE: i32 = 4;

/// User cancelled
pub const CANCELLED: i32 = 130;
