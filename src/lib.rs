pub mod assets;
pub mod changes;
pub mod config;
pub mod export;
pub mod keypath;
pub mod reconcile;
pub mod remote;
pub mod replace;
pub mod retry;
