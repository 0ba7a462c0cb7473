pub mod cms;
pub mod config;
pub mod media;
pub mod model;
pub mod report;
pub mod source;
pub mod sync;
