// Domain layer: core models and ports (interfaces).

pub mod chat;
pub mod model;
pub mod ports;
