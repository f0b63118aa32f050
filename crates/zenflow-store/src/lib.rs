//! `zenflow-store`: durable task list behind a key-value contract.
//!
//! The whole task list is one JSON document under [`task_store::TASKS_KEY`].
//! [`TaskStore`] keeps a working copy in memory, re-reads the document before
//! every operation and rewrites it inside one backend transaction after every
//! mutation, so several processes can share one database file.

pub mod db;
pub mod error;
pub mod kv;
pub mod task_store;

pub use error::{Result, StoreError};
pub use kv::{KvStore, MemoryKv, SqliteKv};
pub use task_store::{TaskStats, TaskStore, TASKS_KEY};
