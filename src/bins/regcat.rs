use regminer::arch::Arch;
use regminer::errors::ExtensionError;
use regminer::regset::catalog;

use clap::Parser;
use tracing::debug;

/// Print the register layout the extension uses for an architecture
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Architecture as the host debugger names it, like `x86-64` or `riscv:rv64`
    #[clap(short, long)]
    arch: Option<String>,
    /// Print the register set as JSON
    #[clap(short, long)]
    json: bool,
    /// Log more, repeat for even more
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), ExtensionError> {
    human_panic::setup_panic!();
    let args = Args::parse();

    setup_logger(args.verbose);
    debug!("set up the logger");

    let Some(identifier) = args.arch else {
        for arch in Arch::ALL {
            println!("{arch}");
        }
        return Ok(());
    };

    let set = catalog().lookup(&identifier)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(set)?);
    } else {
        println!("{set}");
    }

    Ok(())
}

fn setup_logger(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    // construct a subscriber that prints formatted traces to stderr, stdout is for the output
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .finish();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber).expect("could not setup logger");
}
