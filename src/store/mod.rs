//! Flat-File Storage Module
//!
//! Persists every piece of server state as a small JSON file under one data directory.
//!
//! ## Layout
//! - `metadata/master.json`: the master key.
//! - `metadata/{tenant}.json`: one key record per tenant.
//! - `db/{tenant}.json`: one document collection (a JSON array) per tenant.
//!
//! ## Core Concepts
//! - **Atomic rewrites**: every write goes to a temporary sibling file which is then renamed
//!   over the target, so readers never observe a half-written file.
//! - **Positional identity**: documents are addressed by their index in the collection.
//!   Removing a document shifts every later document down by one.
//! - **Per-tenant locking**: `TenantStore` serializes writers per tenant while letting readers
//!   of the same tenant proceed together.

pub mod collection;
pub mod persist;
