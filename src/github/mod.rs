pub mod client;
pub mod graphql;
pub mod types;

pub use client::{GithubApi, HttpGithubClient};
