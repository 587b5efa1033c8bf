//! mupy-lib: catalog resolution and the build pipeline behind `mupy`.
//!
//! A stock of ensemble descriptors is resolved into a bill of materials,
//! materialized as a kit, compiled for a target, then installed and run:
//! - `Stock`: grade levels of ensembles scanned from the filesystem
//! - `Bom`: the dependency tree of one entry part
//! - `Kit`: the BOM copied and shell-processed into one directory
//! - `Build`: the kit compiled for a `Target`, cached by source checksum
//! - `Install`/`Runner`: deployment to the target and execution

pub mod bom;
pub mod build;
pub mod catalog;
pub mod config;
pub mod consts;
pub mod deploy;
pub mod error;
pub mod kit;
pub mod placeholder;
pub mod session;
pub mod setup;
pub mod stock;
pub mod syntax;
pub mod tag;
pub mod target;
pub mod util;

pub use error::{Error, ErrorKind};
