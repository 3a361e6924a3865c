//! Hand-maintained mirror of the `feast.types` protobuf package.
//!
//! Only the two leaf messages the online store exchanges with the rest of the
//! feature store (`Value` and `EntityKey`) are kept, so the definitions are
//! derived in place instead of generated through a build script.

pub mod types;
