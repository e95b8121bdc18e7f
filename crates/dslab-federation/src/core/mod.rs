pub mod allocation_policies;
pub mod allocation_policy;
pub mod bot;
pub mod broker;
pub mod common;
pub mod config;
pub mod datacenter;
pub mod eligibility;
pub mod events;
pub mod federation;
pub mod host;
pub mod latency;
pub mod member;
pub mod resource_pool;
pub mod state;
pub mod task;
pub mod task_scheduler;
pub mod user;
pub mod vm;
pub mod workload;
