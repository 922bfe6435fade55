// Catalog-specific parsing; no I/O here.

pub mod loc;
pub mod smithsonian;
