pub mod container;
pub mod process;

pub use container::{ContainerExit, Runtime, StartError};
pub use process::{ProcessError, ProcessRunner, RealRunner};
