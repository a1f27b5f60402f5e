//! # Prompt Template Modules
//!
//! This module organizes the prompt templates and the fixed messages the
//! conversation controller writes into the log.

pub mod core;
