//! `palaver models`: print the built-in catalog

use std::error::Error;
use std::io::{self, Write};

use crate::core::catalog::ModelCatalog;
use crate::core::config::Config;

/// Write the catalog, marking `selected` (or the default when it is unset
/// or no longer offered).
pub fn write_models<W: Write>(
    out: &mut W,
    catalog: &ModelCatalog,
    selected: Option<&str>,
) -> io::Result<()> {
    let current = selected
        .filter(|id| catalog.contains(id))
        .unwrap_or_else(|| catalog.default_id());

    writeln!(out, "Available models:")?;
    for (index, model) in catalog.list().iter().enumerate() {
        let marker = if model.id == current { "*" } else { " " };
        writeln!(out, "{marker} {}. {}", index + 1, model.display_name)?;
        writeln!(out, "     Id: {}", model.id)?;
        writeln!(out, "     Vendor: {}", model.vendor)?;
        writeln!(out, "     {}", model.description)?;
    }
    writeln!(out)?;
    writeln!(out, "Use `palaver -m <number|id>` to chat with a specific model.")
}

pub fn list_models() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let mut stdout = io::stdout().lock();
    write_models(&mut stdout, ModelCatalog::builtin(), config.selected_model.as_deref())?;
    Ok(())
}
