// Domain layer: platform entity models and ports (interfaces). No HTTP or framework types here.

pub mod model;
pub mod ports;
