//! Read-side queries

pub mod movies;

pub use movies::Movie;
