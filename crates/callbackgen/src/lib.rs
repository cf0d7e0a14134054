//! # callbackgen
//!
//! Build-time generator for observer-style callback methods. Fields named
//! `*_callbacks` get a register / emit / remove method triple:
//!
//! | Field | Generated methods |
//! |-------|-------------------|
//! | `snapshot_callbacks: Vec<fn(&Snapshot)>` | `on_snapshot`, `emit_snapshot`, `remove_on_snapshot` |
//! | `message_by_request_id_callbacks: HashMap<RequestId, Vec<fn(&str)>>` | `on_message_by_request_id`, `emit_message_by_request_id`, `remove_on_message_by_request_id` |
//!
//! Callbacks are `fn` pointers or `Arc<dyn Fn(..)>` / `Rc<dyn Fn(..)>` handles,
//! which is what makes removal by identity possible.
//!
//! ## Usage
//!
//! ### 1. Declare callback fields
//!
//! ```rust,ignore
//! use callbackgen::Callbacks;
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//!
//! #[derive(Callbacks)]
//! #[callbacks(lock = "mu")]
//! pub struct User {
//!     mu: Mutex<()>,
//!     snapshot_callbacks: Vec<fn(&Snapshot)>,
//!     message_by_request_id_callbacks: HashMap<RequestId, Vec<fn(&str)>>,
//! }
//!
//! mod user_callbacks {
//!     include!(concat!(env!("OUT_DIR"), "/user_callbacks.rs"));
//! }
//! ```
//!
//! ### 2. Generate the methods in build.rs
//!
//! ```rust,ignore
//! // build.rs
//! use callbackgen::CodeGenerator;
//!
//! fn main() {
//!     let out = std::path::PathBuf::from(std::env::var("OUT_DIR").unwrap());
//!     let generated = CodeGenerator::new()
//!         .add_source_dir("src").unwrap()
//!         .write_to_file(out.join("user_callbacks.rs")).unwrap();
//!     for diagnostic in &generated.diagnostics {
//!         println!("cargo:warning={diagnostic}");
//!     }
//!
//!     println!("cargo:rerun-if-changed=src");
//! }
//! ```
//!
//! The generated file is meant to be included as a child module of the module
//! that declares the type, so it can reach private fields.
//!
//! ## Receivers and arguments
//!
//! Methods take `&self` / `&mut self` when the type has any method with a
//! `self` receiver. A type with only associated functions such as
//! `fn len(feed: &Self)` gets associated functions bound the same way
//! (`Feed::on_item(&mut feed, cb)`), and a type with none falls back to the
//! lowercase initial of its name.
//!
//! Emit hands its arguments to every callback: references and scalars as is,
//! anything else through `Clone::clone`.

mod classifier;
mod error;
mod extractor;
mod generator;
mod imports;
mod receiver;
mod registry;
mod resolver;
mod template;
mod types;

pub use classifier::{classify, event_name};
pub use error::{Diagnostic, Error, Result};
pub use extractor::SourceModel;
pub use generator::{CodeGenerator, Generated};
pub use receiver::ReceiverBinding;
pub use registry::{KnownType, TypeRegistry};
pub use resolver::TypeResolver;
pub use template::LockPolicy;
pub use types::{
    CallbackField, FieldDecl, GenericArg, Generics, Identity, NameOrigin, NamedType,
    OperationDecl, Package, Param, ResolvedType, Shape, Signature, TargetType, TypePath,
};

#[cfg(feature = "derive")]
pub use callbackgen_derive::Callbacks;
