pub mod issues;
pub mod links;
pub mod pull_requests;
