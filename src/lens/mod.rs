pub mod client;

pub use client::{LensClient, LensError};
