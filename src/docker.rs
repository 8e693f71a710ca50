mod compose;
mod status;

pub use compose::DockerCompose;
