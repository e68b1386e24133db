//! Built-in library implementations.
//!
//! Each module registers one library with the registry; interpreters build
//! them on first `import`.

use crate::library::LibraryRegistry;

pub(crate) mod base64_lib;
pub(crate) mod json_lib;
pub(crate) mod math_lib;
pub(crate) mod os_lib;
pub(crate) mod time_lib;
pub(crate) mod tool_lib;

/// Registers the standard catalogue.
pub(crate) fn register_defaults(registry: &LibraryRegistry) {
    registry.register_native("math", math_lib::build);
    registry.register_native("json", json_lib::build);
    registry.register_native("base64", base64_lib::build);
    registry.register_native("time", time_lib::build);
    registry.register_native("os", os_lib::build);
    registry.register_native(tool_lib::LIBRARY_NAME, tool_lib::build);
}
