use crate::cli::{DEFAULT_DB, ViewArgs};
use crate::controller::{DashboardConfig, StatsPageController};
use crate::error::Result;
use crate::settings::{self, SettingsFile};
use crate::service::SettingsSource;
use crate::storage::StatsStore;
use crate::tui::App;
use std::path::Path;

/// Run the view command - opens the stats dashboard on a database
pub fn run(args: &ViewArgs) -> Result<()> {
    let path = args.file.as_deref().unwrap_or(Path::new(DEFAULT_DB));
    let store = StatsStore::open(path)?;

    let settings_file = args.settings.as_deref().map(SettingsFile::new);
    let settings = settings::load_or_default(settings_file.as_ref().map(|f| f as &dyn SettingsSource));

    let config = DashboardConfig {
        page_length: args.length,
        refresh: args.refresh,
        metric: args.metric,
        window: args.window,
    };
    let controller = StatsPageController::new(store, config, settings);

    let mut app = App::new(controller, path);
    app.run()
}
