//! Store behavior tests against an in-process agent service.
//!
//! - `harness.rs`   - scripted agent service, factory, and hub builders
//! - `projects.rs`  - project CRUD, optimistic revert, lifecycle locking, persistence
//! - `sessions.rs`  - context keys, aggregate rebuilding, create/update/delete
//! - `worktrees.rs` - per-project initialization, default lookup, revert
//! - `providers.rs` - catalog caching and lookups

mod harness;
mod sessions;
