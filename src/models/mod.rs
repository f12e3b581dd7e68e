//! Data models for content site entities

mod article;

pub use article::*;
