pub mod dataset;
pub mod docset;
pub mod index;
pub mod namespace;
