//! kubefix - diagnose and remediate workloads stuck on cluster scheduling problems

pub mod cli;
pub mod client;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod error;
pub mod execute;
pub mod inspect;
pub mod output;
pub mod plan;
pub mod rules;
