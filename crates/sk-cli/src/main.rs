//! session-keeper - Cookie-bound server-side sessions
//!
//! Drive the session lifecycle from the command line.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a default configuration
//! session-keeper config init
//!
//! # Run a request without a cookie, storing a value
//! session-keeper request --set lang=en
//!
//! # Replay the request with the issued cookie
//! session-keeper request --cookie <token> --remember
//!
//! # Inspect and clean up
//! session-keeper show <token>
//! session-keeper sweep
//! ```

mod commands;

fn main() {
    if let Err(err) = commands::run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
