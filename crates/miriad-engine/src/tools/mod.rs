pub mod present;

use std::sync::Arc;

use miriad_store::Stores;

use crate::registry::{ToolRegistry, ToolSource};

/// Registry with the core built-in tools. Coding tools (bash, read, write,
/// edit, glob, grep) and MCP-enumerated tools register on top of this at
/// startup.
pub fn create_core_registry(stores: &Stores) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        Arc::new(present::PresentSetMissionTool::new(stores.present.clone())),
        ToolSource::BuiltIn,
    );
    registry.register(
        Arc::new(present::PresentSetStatusTool::new(stores.present.clone())),
        ToolSource::BuiltIn,
    );
    registry.register(
        Arc::new(present::PresentUpdateTasksTool::new(stores.present.clone())),
        ToolSource::BuiltIn,
    );

    registry
}
