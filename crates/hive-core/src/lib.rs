//! Core library for `Hive`.
//!
//! Contains the field-level credential encryption service, the envelope
//! codec for its persisted representation, and the ownership/role
//! authorization resolver that gates every read or mutation of a tenant
//! resource. This crate knows nothing about HTTP or SQL — persistence is
//! reached through the [`authz::Directory`] capability injected by the
//! server.
//!
//! Control flow contract: a caller asks [`authz::OwnershipResolver`] for a
//! decision first, and only on a positive decision decrypts a stored
//! credential through [`crypto::FieldCipher`]. The cipher never consults
//! authorization; the resolver never touches ciphertext.

pub mod authz;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod types;
