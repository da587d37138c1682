use std::process::exit;

use clap::Parser;
use env_logger::Env;
use firewall::cmd::Cmd;
use log::error;

#[tokio::main]
async fn main() {
    let cmd = Cmd::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(cmd.verbose.as_str())).init();

    if let Err(e) = cmd.execute().await {
        error!("{:#}", e);
        exit(1);
    }
}
