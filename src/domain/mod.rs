// Domain layer: core models and ports (interfaces) for the browser and stream collaborators.

pub mod model;
pub mod ports;
