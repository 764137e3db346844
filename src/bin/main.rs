// Copyright (c) 2019 Rafael Alcaraz Mercado. All rights reserved.
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// All files in the project carrying such notice may not be copied, modified, or distributed
// except according to those terms.
// THE SOURCE CODE IS AVAILABLE UNDER THE ABOVE CHOSEN LICENSE "AS IS", WITH NO WARRANTIES.

//! Thin CLI entry point. The only externally visible mode is `--selftest`
//! (spec §6): a headless sweep that writes a text report to stdout and
//! exits with the number of failed checks. There is no other user-facing
//! surface here; the UI built on top of this crate is out of scope.

use chronos_core::selftest;
use clap::Parser;

#[derive(Parser)]
#[command(name = "chronos", about = "Chronos disk imaging engine")]
struct Cli {
    /// Run the headless self-test sweep, print a report, and exit with the
    /// number of failed checks.
    #[arg(long)]
    selftest: bool,
}

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if cli.selftest {
        let report = selftest::run();
        print!("{}", report.render());
        std::process::exit(report.failed_count() as i32);
    }

    eprintln!("nothing to do: pass --selftest to run the headless check sweep");
    std::process::exit(0);
}
