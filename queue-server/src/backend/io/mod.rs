//! # IO Layer
//!
//! Everything that crosses the process boundary: the REST API and the
//! outlet directory file loaded at startup.

pub mod directory_file;
pub mod rest;

pub use directory_file::DirectoryFile;
