mod arena;
mod bootstrap;
mod loop_runner;
mod metrics;

pub(crate) use bootstrap::build_app;
pub(crate) use loop_runner::run;
