//! listkv CLI Client
//!
//! Command-line interface for interacting with a listkv server.

use clap::{Parser, Subcommand};
use listkv::network::Client;
use listkv::protocol::Command;

/// listkv CLI
#[derive(Parser, Debug)]
#[command(name = "listkv-cli")]
#[command(about = "CLI for the listkv list store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty list
    Create {
        /// The list key
        key: String,
    },

    /// Append a value to a list
    Append {
        /// The list key
        key: String,

        /// The value to append
        #[arg(allow_negative_numbers = true)]
        value: i64,
    },

    /// Get the value at an index
    Get {
        /// The list key
        key: String,

        /// 0-based index in append order
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },

    /// Remove and print the last appended value
    Remove {
        /// The list key
        key: String,
    },

    /// Print the length of a list
    Size {
        /// The list key
        key: String,
    },

    /// Ping the server
    Ping,
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Create { key } => Command::Create { key },
            Commands::Append { key, value } => Command::Append { key, value },
            Commands::Get { key, index } => Command::Get { key, index },
            Commands::Remove { key } => Command::Remove { key },
            Commands::Size { key } => Command::Size { key },
            Commands::Ping => Command::Ping,
        }
    }
}

fn main() {
    let args = Args::parse();

    let mut client = match Client::connect(&args.server) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let command = Command::from(args.command);
    let is_ping = matches!(command, Command::Ping);

    match client.call(&command) {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) if is_ping => println!("PONG"),
        Ok(None) => println!("OK"),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
