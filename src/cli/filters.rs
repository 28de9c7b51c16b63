use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use tracing::info;

use paneldeck::filter_center::{FilterConfig, FilterSet};

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct FiltersArgs {
    #[command(subcommand)]
    pub action: FiltersAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum FiltersAction {
    /// Show the active filter set
    Show,

    /// Replace the active filters with a JSON object
    Apply {
        /// Filter set, e.g. '{"property":{"propertyType":"Land"}}'
        filters: String,
    },

    /// Merge a JSON object into the active filters, domain by domain
    Merge {
        /// Filter set to merge
        filters: String,
    },

    /// Reset the active filters to {}
    Clear,

    /// Save a filter set as a named preset
    Save {
        /// Preset name
        name: String,

        /// Filter set; defaults to the active filters
        #[arg(long)]
        filters: Option<String>,

        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a preset by id
    Delete {
        /// Preset id
        id: String,
    },

    /// Apply a saved preset
    Load {
        /// Preset id
        id: String,
    },

    /// List saved presets
    List,

    /// Mark a preset as default, or apply the current default when no id is given
    Default {
        /// Preset id
        id: Option<String>,
    },
}

pub async fn cmd_filters(args: FiltersArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let center = ctx.deck().await.filters();
    match args.action {
        FiltersAction::Show => show_set(format, &center.active_filters()),
        FiltersAction::Apply { filters } => {
            let active = center.apply_filters(parse_filter_set(&filters)?);
            show_set(format, &active)
        }
        FiltersAction::Merge { filters } => {
            let active = center.merge_filters(&parse_filter_set(&filters)?);
            show_set(format, &active)
        }
        FiltersAction::Clear => show_set(format, &center.clear_filters()),
        FiltersAction::Save {
            name,
            filters,
            description,
        } => {
            let set = match filters {
                Some(raw) => parse_filter_set(&raw)?,
                None => center.active_filters(),
            };
            let preset = center.save_filter(&name, set, description)?;
            info!(id = %preset.id, "saved preset");
            emit(format, &preset, || format!("saved {} ({})", preset.name, preset.id))
        }
        FiltersAction::Delete { id } => {
            let deleted = center.delete_filter(&id);
            emit(
                format,
                &serde_json::json!({"id": id, "deleted": deleted}),
                || {
                    if deleted {
                        format!("deleted {}", id)
                    } else {
                        format!("no preset with id {}", id)
                    }
                },
            )
        }
        FiltersAction::Load { id } => {
            let active = center
                .load_filter(&id)
                .with_context(|| format!("could not load preset {}", id))?;
            show_set(format, &active)
        }
        FiltersAction::List => {
            let presets = center.presets();
            emit(format, &presets, || render_presets(&presets))
        }
        FiltersAction::Default { id: Some(id) } => {
            let preset = center.set_default_filter(&id)?;
            emit(format, &preset, || format!("default preset is now {}", preset.name))
        }
        FiltersAction::Default { id: None } => match center.apply_default_filter() {
            Some(active) => show_set(format, &active),
            None => bail!("no default preset"),
        },
    }
}

pub fn parse_filter_set(raw: &str) -> Result<FilterSet> {
    let value: Value = serde_json::from_str(raw).context("filters must be valid JSON")?;
    Ok(FilterSet::try_from(value)?)
}

fn show_set(format: OutputFormat, set: &FilterSet) -> Result<()> {
    emit(format, set, || {
        if set.is_empty() {
            "no active filters".to_string()
        } else {
            set.domains()
                .map(|(domain, value)| format!("{domain}: {value}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    })
}

fn render_presets(presets: &[FilterConfig]) -> String {
    if presets.is_empty() {
        return "no saved presets".to_string();
    }
    presets
        .iter()
        .map(|preset| {
            let marker = if preset.is_default { "*" } else { " " };
            format!(
                "{marker} {}  {}  v{}  {}",
                preset.id,
                preset.name,
                preset.version,
                preset.updated_at.to_rfc3339()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
