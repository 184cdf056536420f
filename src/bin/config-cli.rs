use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use env_config_sync::config::{self, SchemaPreset, SchemaSettings};
use env_config_sync::schema::Schema;

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Offline tooling for environment configuration schemas", long_about = None)]
struct Cli {
    /// Schema definition file (TOML). The racing preset is used when omitted.
    #[arg(short, long)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every key with its type and default
    Schema,
    /// Print the default snapshot of each namespace
    Defaults,
    /// Validate an overrides file against the schema
    Check {
        /// Overrides file (TOML)
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = SchemaSettings {
        path: cli.schema,
        preset: SchemaPreset::Racing,
    };
    let schema = config::load_schema(&settings)?;

    let output = match cli.command {
        Commands::Schema => serde_json::to_value(schema.to_definition())?,
        Commands::Defaults => defaults(&schema)?,
        Commands::Check { path } => match config::load_overrides(&path, &schema) {
            Ok(overrides) => {
                let namespaces: Vec<String> =
                    overrides.namespaces().map(|(ns, _)| ns.to_string()).collect();
                json!({"valid": true, "keys": overrides.len(), "namespaces": namespaces})
            }
            Err(e) => {
                println!("{}", serde_json::to_string_pretty(&json!({"valid": false, "error": e.to_string()}))?);
                std::process::exit(1);
            }
        },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn defaults(schema: &Schema) -> Result<Value, serde_json::Error> {
    let mut namespaces = serde_json::Map::new();
    for snapshot in schema.default_snapshots() {
        namespaces.insert(
            snapshot.namespace.to_string(),
            serde_json::to_value(snapshot.to_record())?,
        );
    }
    Ok(Value::Object(namespaces))
}
