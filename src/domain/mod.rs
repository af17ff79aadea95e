// Domain layer: records, canonical models and ports (interfaces).

pub mod model;
pub mod ports;
