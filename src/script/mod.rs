//! Config script compilation and loading
//!
//! [`ScriptCompiler`] bundles the entry script and its local imports into one
//! temporary artifact; [`ModuleRegistry`] evaluates that artifact, extracts the
//! config factory and invokes it.

pub mod compiler;
pub mod loader;
pub mod value;

pub use compiler::{CompiledScript, ScriptCompiler};
pub use loader::{FactoryExport, FactoryResult, ModuleRegistry};
pub use value::FUNCTION_TAG;
