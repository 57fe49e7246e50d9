//! # Wire Header Definitions
//!
//! ## Purpose
//!
//! Defines the fixed-layout headers carried on every message exchanged by the
//! point-to-point device. Sender and receiver share these definitions; the
//! layout must match bit-for-bit between peers.
//!
//! ## Architecture Role
//!
//! ```text
//! device (post) → [WireHeader | extension] → transport → router / matcher
//!
//!     ┌──────────────────────────────────────────────┐
//!     │        20-Byte Common Header                 │
//!     ├──────────────────────────────────────────────┤
//!     │ type (4) │ tag (4) │ context (4) │ src (4)   │
//!     │ seq (4)                                      │
//!     └──────────────────────────────────────────────┘
//!                         ↓
//!      [type-specific extension: cancel / RMA / lock]
//!                         ↓
//!                 [user payload, if any]
//! ```
//!
//! ## Header Variants
//!
//! - [`WireHeader`] - data, ack and cancel-ack traffic
//! - [`CancelHeader`] - cancellation request with the retracted send type
//! - [`RmaHeader`] - put / accumulate / get addressing
//! - [`LockHeader`] - window lock and unlock requests

pub mod header;

pub use header::*;
