//! Pipeline stages for one extraction request.
//!
//! Each submodule implements exactly one step. Stages return
//! [`crate::error::ProcessingError`]; the orchestrator in [`crate::process`]
//! tags it with the stage and hands it to the classifier.
//!
//! ## Data Flow
//!
//! ```text
//! request ──▶ fetch ──▶ open ──▶ extract ──▶ geometry ──▶ assemble
//! (validate)  (S3)     (engine)  (pages)     (normalize)   (envelope)
//! ```
//!
//! 1. [`request`]: unwrap gateway events, validate `s3_path` and
//!    `graphics_mode`
//! 2. [`fetch`] / [`s3`]: resolve the reference to bytes through an
//!    [`fetch::ObjectStore`]; the only stage with network I/O
//! 3. [`open`]: empty/size checks, engine open-failure mapping
//! 4. [`extract`]: page-by-page markdown ([`tables`], [`postprocess`]) and
//!    word geometry; runs in `spawn_blocking` because the engine is blocking
//! 5. [`geometry`]: native word boxes to normalized + absolute boxes
//! 6. [`assemble`]: success and failure envelopes

pub mod assemble;
pub mod extract;
pub mod fetch;
pub mod geometry;
pub mod open;
pub mod postprocess;
pub mod request;
pub mod s3;
pub mod tables;
