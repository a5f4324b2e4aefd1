pub mod buffer;
pub mod pipe;
pub mod prelude;
pub mod strng;
pub mod telemetry;
