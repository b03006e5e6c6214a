// Domain layer: venue models and ports (interfaces) shared by the core and the config layer.

pub mod model;
pub mod ports;
