//! Background services spawned at startup.

pub mod reconciler;
