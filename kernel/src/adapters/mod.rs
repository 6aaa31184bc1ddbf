// Read-only adapters for external collaborator formats.

pub mod feature_map;
