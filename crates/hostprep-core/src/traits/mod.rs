//! Collaborator traits for hostprep
//!
//! This module defines the abstract interfaces the wizard drives. Real
//! implementations live in satellite crates or the binary; tests use doubles.
//!
//! - [`PublicIpSource`]: Report this host's public IPv4 address
//! - [`DomainResolver`]: Resolve a domain's A records via a recursive resolver
//! - [`Prompter`]: Ask the operator questions and show notices
//! - [`Handoff`]: Launch the external deployment engine

pub mod handoff;
pub mod ip_source;
pub mod prompt;
pub mod resolver;

pub use handoff::{Handoff, HandoffReport};
pub use ip_source::PublicIpSource;
pub use prompt::{ABORT_KEYWORD, Notice, Prompter, Reply};
pub use resolver::DomainResolver;
