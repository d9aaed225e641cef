pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod models;
pub mod pagination;
pub mod recipes;
pub mod relations;
pub mod routes;

#[cfg(test)]
mod testing;
