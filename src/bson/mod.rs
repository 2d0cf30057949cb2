pub mod document;
pub mod json;
pub mod objectid;
pub mod path;
pub mod pathnode;
pub mod value;
