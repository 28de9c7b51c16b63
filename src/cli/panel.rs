use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::json;

use super::context::CliContext;
use super::output::{emit, OutputFormat};

#[derive(Args, Clone, Debug)]
pub struct PanelArgs {
    #[command(subcommand)]
    pub action: PanelAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum PanelAction {
    /// Show the persisted state record of a panel
    Show {
        /// Panel id
        id: String,
    },

    /// Remove the persisted state record of a panel
    Reset {
        /// Panel id
        id: String,
    },
}

pub async fn cmd_panel(args: PanelArgs, ctx: &CliContext, format: OutputFormat) -> Result<()> {
    let store = ctx.deck().await.panel_store();
    match args.action {
        PanelAction::Show { id } => match store.load_panel_state(&id) {
            Some(record) => emit(format, &record, || {
                format!(
                    "{} ({}) v{} updated {}\n{}",
                    record.id,
                    record.content_type,
                    record.version,
                    record.last_updated.to_rfc3339(),
                    serde_json::Value::Object(record.state.clone())
                )
            }),
            None => emit(format, &json!(null), || {
                format!("no persisted state for {}", id)
            }),
        },
        PanelAction::Reset { id } => {
            store.delete_panel_state(&id);
            emit(format, &json!({"reset": id}), || format!("reset {}", id))
        }
    }
}
