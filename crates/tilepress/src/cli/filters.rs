//! The `tilepress filters` command for listing the built-in catalog.

use clap::Args;
use tilepress_core::filters;

/// Arguments for the `filters` command.
#[derive(Args, Debug)]
pub struct FiltersArgs {
    /// Emit the catalog as JSON (including color matrices)
    #[arg(long)]
    pub json: bool,
}

/// Execute the filters command.
pub async fn execute(args: FiltersArgs) -> anyhow::Result<()> {
    let catalog = filters::catalog();

    if args.json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }

    println!("Built-in filters:");
    for filter in catalog {
        let kind = if filter.is_identity() {
            "pass-through"
        } else if filter.overlay.is_some() {
            "matrix + overlay"
        } else {
            "matrix"
        };
        println!("    - {:10} {:14} {}", filter.id, filter.label, kind);
    }
    println!("\nApply one with `tilepress process <input> --filter <id>`.");

    Ok(())
}
