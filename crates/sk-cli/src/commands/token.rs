//! Token command
//!
//! Mint session identifiers.

use anyhow::{bail, Result};
use clap::Args;
use sk_core::session::IdentifierGenerator;

/// Arguments for the token command
#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Number of identifiers to mint
    #[arg(default_value_t = 1)]
    pub count: usize,
}

/// Execute the token command
pub fn execute(args: TokenArgs) -> Result<()> {
    if args.count == 0 {
        bail!("Count must be at least 1");
    }
    let generator = IdentifierGenerator::new();
    for _ in 0..args.count {
        println!("{}", generator.generate());
    }
    Ok(())
}
