//! Network documents, as the nodelist consumes them.
//!
//! The nodelist correlates three separately sourced records per relay: a
//! router descriptor ([`routerdesc::RouterInfo`]), a consensus entry
//! ([`netstatus::RouterStatus`]), and a microdescriptor
//! ([`microdesc::Microdesc`]).  The types here carry the already-validated
//! contents of those documents; parsing their wire encodings is the
//! business of the directory layer, and documents are constructed here only
//! through builders.
//!
//! The [`store`] module holds the in-memory faces of the documents'
//! external owners: the router list and the microdescriptor cache.

pub mod microdesc;
pub mod netstatus;
pub mod routerdesc;
pub mod store;

/// A 256-bit digest identifying some relay document.
///
/// In a microdescriptor-flavored consensus this is the SHA256 digest of the
/// relay's microdescriptor; in an ns-flavored consensus it identifies the
/// relay's full descriptor.
pub type DocDigest = [u8; 32];
