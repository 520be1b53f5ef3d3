// SPDX-License-Identifier: MPL-2.0
//! Application layer - collaborator ports.
//!
//! - [`port`]: Trait definitions (interfaces) for dependency inversion
//!
//! # Dependency Rule
//!
//! - Application layer depends on domain layer (uses domain types)
//! - Infrastructure layer implements application layer ports
//! - The playback core consumes ports, never concrete adapters

pub mod port;
