//! Upstream event ingress
//!
//! The upstream event source is external: it authenticates, keeps its feed
//! gapless and ordered, and hands the hub one decoded event at a time. This
//! module turns each event into a JSON payload and submits it for fan-out.
//!
//! Two entry points are provided:
//!
//! - [`IngressAdapter::on_domain_event`] for callback-style sources,
//! - [`IngressAdapter::spawn_feed`] for sources exposed as a `Stream`.

pub mod adapter;

pub use adapter::IngressAdapter;
