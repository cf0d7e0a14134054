//! Proc-macro providing the `#[derive(Callbacks)]` attribute.
//!
//! This macro is a **no-op annotation** - it doesn't generate any code.
//! It marks a struct whose `*_callbacks` fields should get observer methods
//! generated by `callbackgen` in your build.rs.
//!
//! # Usage
//!
//! 1. Annotate your types with `#[derive(Callbacks)]`
//! 2. Optionally name a lock field with `#[callbacks(lock = "mu")]`
//! 3. Run `CodeGenerator` in your build.rs to generate the methods
//!
//! # Example
//!
//! ```rust,ignore
//! use callbackgen::Callbacks;
//!
//! pub type SnapshotCallback = fn(snapshot: u32);
//!
//! #[derive(Callbacks)]
//! #[callbacks(lock = "mu")]
//! struct Feed {
//!     mu: std::sync::Mutex<()>,
//!     snapshot_callbacks: Vec<SnapshotCallback>,
//! }
//! ```
//!
//! Then in your build.rs:
//!
//! ```rust,ignore
//! use callbackgen::CodeGenerator;
//!
//! fn main() {
//!     let out_dir = std::env::var("OUT_DIR").unwrap();
//!     CodeGenerator::new()
//!         .add_source_dir("src").unwrap()
//!         .write_to_file(format!("{out_dir}/feed_callbacks.rs"))
//!         .unwrap();
//! }
//! ```

use proc_macro::TokenStream;

/// Marker derive macro for callback method generation.
///
/// This macro is a no-op - it doesn't generate any code at compile time.
/// The `callbacks` helper attribute is read by the source front-end of
/// `callbackgen`, not by this macro.
#[proc_macro_derive(Callbacks, attributes(callbacks))]
pub fn derive_callbacks(_input: TokenStream) -> TokenStream {
    // No-op: actual code generation happens in build.rs
    TokenStream::new()
}
