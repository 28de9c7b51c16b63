use clap::Subcommand;

use super::demo::DemoArgs;
use super::filters::FiltersArgs;
use super::panel::PanelArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Inspect and edit the active filters and saved presets
    Filters(FiltersArgs),

    /// Inspect or reset persisted panel state
    Panel(PanelArgs),

    /// Run the filter panel -> data panel walkthrough
    Demo(DemoArgs),
}
