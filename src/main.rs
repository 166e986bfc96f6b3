//! Thin demo binary: brings up the Router on a named interface and either
//! dials or listens depending on argv, mirroring the kind of smoke-test
//! `main` the original `cmd/` examples used to exercise `ptcp.Init`.

use std::env;

use log::info;
use ptcp::ptcp;

fn usage() -> ! {
    eprintln!("usage: ptcp-demo <interface> dial <ip:port>");
    eprintln!("       ptcp-demo <interface> listen <ip:port>");
    std::process::exit(2)
}

fn main() -> ptcp::result::Result<()> {
    ptcp::init_log();

    let mut args = env::args().skip(1);
    let interface = args.next().unwrap_or_else(|| usage());
    let mode = args.next().unwrap_or_else(|| usage());
    let addr = args.next().unwrap_or_else(|| usage());

    ptcp::init(&interface)?;

    match mode.as_str() {
        "dial" => {
            let conn = ptcp::dial("ptcp", &addr)?;
            info!("connected to {}", conn.remote_addr());
            let mut buf = [0_u8; 4096];
            loop {
                let n = conn.read(&mut buf)?;
                if n == 0 {
                    continue;
                }
                print!("{}", String::from_utf8_lossy(&buf[..n]));
            }
        }
        "listen" => {
            let listener = ptcp::listen("ptcp", &addr)?;
            info!("listening on {}", listener.addr());
            loop {
                let conn = listener.accept()?;
                info!("accepted {}", conn.remote_addr());
                let mut buf = [0_u8; 4096];
                let n = conn.read(&mut buf)?;
                print!("{}", String::from_utf8_lossy(&buf[..n]));
            }
        }
        _ => usage(),
    }
}
