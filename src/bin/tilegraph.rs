/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Context;
use clap::Parser;
use tilegraph::config::Config;
use tilegraph::dispatch_algorithm;
use tilegraph::runtime::{write_log, Runtime};

fn run(config: Config) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;

    dispatch_algorithm!(config.algorithm, K => {
        let mut runtime = Runtime::<K>::open(&config).context("failed to open storage")?;
        let rows = runtime.run(&config).context("run failed")?;
        write_log(config.log.as_ref(), &rows).context("failed to write --log output")?;
    });

    Ok(())
}

fn main() {
    env_logger::init();
    let config = match Config::try_parse() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = run(config) {
        eprintln!("tilegraph: {e:#}");
        std::process::exit(1);
    }
}
