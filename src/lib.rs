// Copyright 2023 Remi Bernotavicius

pub mod catalog;
pub mod composition;
pub mod config;
pub mod database;
pub mod error;
pub mod membership;
pub mod recipes;
pub mod shopping_list;
pub mod users;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
