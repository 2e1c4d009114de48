//! # Atelier
//!
//! The transformation core of a kiosk photo booth: a customer's photo
//! goes in, an artistic rendition comes out, and a bounded-concurrency
//! queue keeps the kiosk responsive while the pixels crunch.
//!
//! # Architecture: Pure Filters Behind a Message-Passing Queue
//!
//! ```text
//! enqueue(buffer, params) → Scheduler → WorkerPool → Engine → filter
//!                               ↑  ←  progress / completed / failed  ←┘
//! ```
//!
//! Two design rules shape everything here:
//!
//! - **Filters are pure functions.** Each algorithm maps one owned
//!   [`PixelBuffer`](buffer::PixelBuffer) plus a typed parameter record to
//!   a brand-new buffer — no aliasing, no hidden settings reads, byte-for-
//!   byte deterministic. That makes every filter unit-testable with a
//!   handful of crafted pixels.
//! - **The scheduler is the only writer.** Job state lives in one table
//!   owned by one component; workers receive owned copies and answer
//!   with messages. A worker can crash or hang without corrupting
//!   bookkeeping — at worst its job times out.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`buffer`] | `PixelBuffer` — validated RGBA image representation |
//! | [`filters`] | The three artistic algorithms + their typed parameter records |
//! | [`engine`] | `Processor` trait with lifecycle, CPU implementation, kind dispatch |
//! | [`job`] | `Job` lifecycle: queued → processing → completed \| failed |
//! | [`queue`] | `Scheduler` — FIFO admission, concurrency limit, retry, deadlines |
//! | [`worker`] | Worker threads and the message protocol crossing the boundary |
//! | [`settings`] | Operator-facing TOML settings, snapshotted per job |
//!
//! # Why Parameters Are Snapshots
//!
//! The kiosk UI edits settings while jobs are in flight. Every job
//! therefore records the full parameter set it was submitted with
//! ([`settings::Settings::params_for`]); a running transformation can
//! never observe a settings change, and a retry reproduces the original
//! request exactly.

pub mod buffer;
pub mod engine;
pub mod filters;
pub mod job;
pub mod queue;
pub mod settings;
pub mod worker;
