//! Chat plugins built on the picsearch pipeline.
//!
//! [`ImageSearchPlugin`] intercepts the first image of a message, replies
//! with the best reverse-search match, and stops the rest of the handler
//! chain.

pub mod error;
pub mod image_search;

pub use {
    error::{Error, Result},
    image_search::ImageSearchPlugin,
};
