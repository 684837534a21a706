/// Helpers for assembling fixture workspaces and invoking the binary.
mod common;
/// End-to-end scenarios mirroring the specification's lettered scenarios.
mod scenarios;
