//! # msort Core Library
//!
//! Plans and applies the reorganisation of a music collection into
//! `Artist/Album/NN - Title.ext` under a target root. Folders that cannot be
//! placed cleanly are quarantined whole under a problems directory, with a
//! `.pb.txt` diagnostic for every offending file.
//!
//! The pipeline is [`scanner`] (tag reading through [`metadata`], naming
//! through [`sanitize`] and [`planner`]) followed by [`apply`], both driven
//! from a worker thread by [`run::RunController`].

pub mod apply;
pub mod audio;
pub mod config;
pub mod directory;
pub mod logging;
pub mod metadata;
pub mod planner;
pub mod progress;
pub mod report;
pub mod row;
pub mod run;
pub mod sanitize;
pub mod scanner;
