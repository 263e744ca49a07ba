//! Layer ordering and defaults for the configuration builder.

pub mod merge_policy;
