//! Lifting of programs to executable source text.
//!
//! JavaScript is emitted line by line from the instructions; every Wasm
//! module body is encoded into a binary module and embedded in the script
//! as a byte array.

pub mod js;
pub mod literal;
pub mod wasm;
pub mod writer;

pub use js::JavaScriptLifter;
pub use wasm::{encode_modules, EncodedModule, WasmModuleEncoder};
