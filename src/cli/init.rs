use std::path::PathBuf;

use dialoguer::Input;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{
    load_settings, save_settings, settings_file_exists, shellexpand_path,
};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings()?;

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    } else if !settings_file_exists() {
        // First run: ask for the data directory
        let chosen: String = Input::new()
            .with_prompt("Data directory")
            .default(settings.data_dir.clone())
            .interact_text()?;
        settings.data_dir = shellexpand_path(chosen.trim());
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    println!("Initialized finman at {}", resolved.display());
    Ok(())
}
