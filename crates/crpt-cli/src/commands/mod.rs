pub mod config;
pub mod submit;

pub use submit::{run_submit, SubmitArgs};
