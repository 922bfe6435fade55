// Domain layer: catalog rows, run summaries and the ports pipelines are built on.

pub mod model;
pub mod ports;
