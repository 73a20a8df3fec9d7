//! Protocol buffer types and gRPC service stubs

pub mod plugin;
pub mod tfplugin6;
