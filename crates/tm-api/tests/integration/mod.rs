pub mod common;

mod auth_tests;
mod health_tests;
mod workflow_tests;
