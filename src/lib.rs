//! Assimilate: Cycle Data Preparation for Data Assimilation
//!
//! Prepares each analysis cycle of a data-assimilation experiment: computes the
//! assimilation window, reconciles it against the observation slot grid, renders the
//! solver configuration from hierarchical templates, fetches and merges per-slot
//! observation files, and dispatches the solver.

pub mod cli;
pub mod config;
pub mod cycle;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod merge;
pub mod slots;
pub mod template;
pub mod time;
pub mod window;
