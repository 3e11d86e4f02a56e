//! Client-side caches of server truth.
//!
//! Both stores are plain structs owned by the engine's single consumer task.
//! Every mutation runs as one non-preemptible turn of that task, so the
//! stores carry no internal locking. Background refetch failures are
//! swallowed at the call site: a stale-but-consistent cache beats a cleared
//! one.

mod chat;
mod leads;

pub use chat::ChatStore;
pub use leads::LeadsStore;
