#[macro_use]
extern crate log;
extern crate pretty_env_logger;

pub mod codec;
pub mod link;
pub mod meta;
pub mod netinfo;
pub mod ptcp;
pub mod queue;
pub mod result;

pub fn init_log() {
    pretty_env_logger::init();
}
