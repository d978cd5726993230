use crate::commands::Out;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its subdirectories and:
/// - Creates an initial `config.json` file using `sheet_url` along with default settings
/// - Moves `secret_file` into its default location in the data dir.
///
/// # Arguments
/// - `dues_home` - The directory that will be the root of the data directory, e.g. `$HOME/dues`
/// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the Google
///   OAuth workflow. This will be moved from the `secret_file` path to its default location and
///   name in the data directory.
/// - `sheet_url` - The URL of the Google Sheet where the membership roster is kept.
///   e.g. https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
///
/// # Errors
/// - Returns an error if any file operations fail.
pub async fn init(dues_home: &Path, secret_file: &Path, url: &str) -> Result<Out<()>> {
    let config = Config::create(dues_home, secret_file, url)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Successfully created the dues directory and config. Edit {} to configure the roster \
        columns, troops, payment details and mail templates, then run 'dues auth'",
        config.config_path().display()
    )
    .into())
}
