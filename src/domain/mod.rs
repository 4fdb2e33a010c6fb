// Domain layer: records, callback outcomes and the ports the core depends on.

pub mod model;
pub mod ports;
