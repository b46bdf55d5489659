pub mod local_blob;
#[cfg(any(test, feature = "mock"))]
pub mod memory;
pub mod postgres;
