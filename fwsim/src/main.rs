use std::{sync::Arc, time::Duration};

use clap::Parser;
use log::info;

use fwsim::{
    scanner::Scanner,
    ui::{run_ui, App},
};
use fwsim_engine::{Action, Classifier, NewRule, RuleStore, SharedRuleStore};

const SAMPLE_RULES: [&str; 2] = [
    "allow tcp from 192.168.1.0/24 to any port 80",
    "deny tcp from any to 10.0.0.1 port 22",
];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Verdict when no rule matches (allow or deny).
    #[arg(short, long, default_value = "allow")]
    default_policy: Action,

    /// Refresh period of the display.
    #[arg(short, long, default_value_t = 250u64)]
    tick_rate_ms: u64,

    /// Simulated latency of a port scan.
    #[arg(long, default_value_t = 1500u64)]
    scan_delay_ms: u64,

    /// Seed of the simulated port statuses.
    #[arg(long, default_value_t = 0u64)]
    seed: u64,

    /// Start with an empty rule set.
    #[arg(long)]
    no_sample_rules: bool,
}

fn sample_rules() -> Result<RuleStore, anyhow::Error> {
    let mut store = RuleStore::new();
    for line in SAMPLE_RULES {
        store.insert(line.parse::<NewRule>()?);
    }
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args = Args::parse();

    let store = if args.no_sample_rules {
        RuleStore::new()
    } else {
        sample_rules()?
    };
    info!(
        "starting with {} rules, default policy {}",
        store.len(),
        args.default_policy
    );

    let app = Arc::new(App::new(
        SharedRuleStore::from(store),
        Classifier::new(args.default_policy),
        Scanner::new(Duration::from_millis(args.scan_delay_ms), args.seed),
    ));

    run_ui(app, Duration::from_millis(args.tick_rate_ms)).await?;

    info!("Exiting...");
    Ok(())
}
