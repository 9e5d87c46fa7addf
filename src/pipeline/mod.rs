//! Pipeline stages for page capture.
//!
//! Each submodule implements one step. The browser is only reached through
//! [`crate::engine`], so every stage except the Chrome backend can be tested
//! with an in-memory page.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ slug ──▶ capture ──▶ writer ──▶ assemble
//! (URLs)    (names)   │  ▲        (PNGs)     (pdfium)
//!                     ▼  │
//!               stabilize, modal
//! ```
//!
//! 1. [`source`]    read a URL, a URL list or a sitemap into page descriptors
//! 2. [`slug`]      give every page a run-unique file stem
//! 3. [`capture`]   drive desktop and mobile tabs for one page
//! 4. [`stabilize`] settle, ISI, defloat and hide steps on a live page
//! 5. [`modal`]     optional popup-only image
//! 6. [`writer`]    output cleanup and atomic image writes
//! 7. [`assemble`]  ordered merge into one PDF; runs in `spawn_blocking`

pub mod assemble;
pub mod capture;
pub mod modal;
pub mod slug;
pub mod source;
pub mod stabilize;
pub mod writer;
