//! # dmsync-format
//!
//! Data layer for exchanging values between a host program and DM-script.
//!
//! This crate provides:
//! - The [`TypeSpecifier`] categories and their DM-script type names
//! - [`TypeDef`] structure definitions for nested read-back values
//! - Escaping of string literals and identifiers for generated scripts
//! - The host-native [`Value`] model and DM-script's [`TagGroup`] container
//! - The value codec: script generation for host values and standalone
//!   conversion to and from tag groups
//!
//! ## Example
//!
//! ```ignore
//! use dmsync_format::{ScriptEncoder, TypeSpecifier, Value};
//!
//! let mut encoder = ScriptEncoder::new("__dmsync_");
//! encoder.declare("headlines", &Value::list(["Section 1", "Section 2"]), TypeSpecifier::Any)?;
//!
//! // TagGroup headlines = NewTagList();
//! // headlines.TagGroupInsertTagAsString(infinity(), "Section 1");
//! // ...
//! println!("{}", encoder.into_script());
//! ```
//!
//! ## Compatibility
//!
//! Maps are iterated in key order, which becomes the tag insertion order in
//! the generated `TagGroup`. Whether DM-script keeps that order when the group
//! travels through the persistent tags depends on the host version; decoding
//! never relies on it.

mod codec;
mod error;
pub mod escape;
mod tags;
mod typedef;
mod types;
mod value;

pub use codec::{
    decode_at, decode_standalone, decode_typed, encode_standalone, from_tag_group,
    scalar_literal, to_tag_group, ScriptEncoder, MAX_EXACT_INTEGER,
};
pub use error::{Error, Result};
pub use escape::{escape_identifier, escape_string};
pub use tags::{Tag, TagGroup, TagValue};
pub use typedef::TypeDef;
pub use types::{host_type, script_type_name, script_type_name_for, TypeSpecifier};
pub use value::{List, Map, Value};
