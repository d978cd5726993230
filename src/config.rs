//! Configuration file handling for dues.
//!
//! The configuration file is stored at `$DUES_HOME/config.json` and contains everything the
//! program needs besides OAuth secrets: the Google Sheet URL and tab name, the roster column
//! mapping, the troop list, the payment settings, and the email templates.

use crate::model::{SchemaConfig, TroopTable};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "dues";
const CONFIG_VERSION: u8 = 1;
const SECRETS: &str = ".secrets";
const CLIENT_SECRET_JSON: &str = "client_secret.json";
const TOKEN_JSON: &str = "token.json";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$DUES_HOME` and from there it loads `$DUES_HOME/config.json`. It provides paths
/// to other items that are either configurable or are expected in a certain location within the
/// dues home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
    spreadsheet_id: String,
}

impl Config {
    /// Creates the data directory, its subdirectories and:
    /// - Creates an initial `config.json` file using `sheet_url` along with default settings
    ///   that the user is expected to edit (columns, troops, payment details).
    /// - Moves `secret_file` into its default location in the data dir.
    ///
    /// # Arguments
    /// - `dir` - The directory that will be the root of the data directory, e.g. `$HOME/dues`
    /// - `secret_file` - The downloaded OAuth 2.0 client credentials JSON needed to start the
    ///   Google OAuth workflow.
    /// - `sheet_url` - The URL of the Google Sheet where the roster is kept.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail.
    pub async fn create(
        dir: impl Into<PathBuf>,
        secret_file: &Path,
        sheet_url: &str,
    ) -> Result<Self> {
        // Create the directory if it does not exist
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the dues home directory")?;

        // Canonicalize the directory path
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets_dir = root.join(SECRETS);
        utils::make_dir(&secrets_dir).await?;

        // Move the Google OAuth client credentials file to its default location in the data dir
        let secret_destination = secrets_dir.join(CLIENT_SECRET_JSON);
        utils::rename(secret_file, secret_destination).await?;
        let config_path = root.join(CONFIG_JSON);

        // Create and save an initial ConfigFile in the datastore
        let config_file = ConfigFile {
            sheet_url: sheet_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        // Extract the spreadsheet ID from the URL
        let spreadsheet_id = extract_spreadsheet_id(sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        Ok(Self {
            root,
            secrets: secrets_dir,
            config_path,
            config_file,
            spreadsheet_id,
        })
    }

    /// This will
    /// - validate that the `dues_home` exists and that the config file exists
    /// - load the config file
    /// - validate that the secrets directory exists
    /// - return the loaded configuration object
    pub async fn load(dues_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dues_home.into();
        let root = utils::canonicalize(&maybe_relative).await?;

        // Validate that the home directory exists.
        let _ = utils::read_dir(&root).await.context("Dues Home is missing")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        // Extract the spreadsheet ID from the URL
        let spreadsheet_id = extract_spreadsheet_id(&config_file.sheet_url)
            .context("Failed to extract spreadsheet ID from sheet URL")?
            .to_string();

        let config = Self {
            root: root.clone(),
            secrets: root.join(SECRETS),
            config_path,
            config_file,
            spreadsheet_id,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn sheet_url(&self) -> &str {
        &self.config_file.sheet_url
    }

    pub fn sheet_name(&self) -> &str {
        &self.config_file.sheet_name
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// The roster column mapping.
    pub fn schema(&self) -> &SchemaConfig {
        &self.config_file.columns
    }

    pub fn payment(&self) -> &PaymentConfig {
        &self.config_file.payment
    }

    pub fn mail(&self) -> &MailConfig {
        &self.config_file.mail
    }

    /// Parses the configured troop lines into a lookup table.
    pub fn troop_table(&self) -> Result<TroopTable> {
        let table = TroopTable::parse(&self.config_file.troops)?;
        if table.is_empty() {
            bail!("No troops are configured; edit the 'troops' list in config.json");
        }
        Ok(table)
    }

    /// Returns the stored `client_secret_path` if it is absolute, otherwise resolves the
    /// relative path.
    pub fn client_secret_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.client_secret_path())
    }

    /// Returns the stored `token_path` if it is absolute, otherwise resolves the relative path.
    pub fn token_path(&self) -> PathBuf {
        self.resolve_secrets_file_path(self.config_file.token_path())
    }

    /// Checks if `p` is relative, and if so, resolves it. Returns it unchanged if it is absolute.
    fn resolve_secrets_file_path(&self, p: PathBuf) -> PathBuf {
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "dues",
///   "config_version": 1,
///   "sheet_url": "https://docs.google.com/spreadsheets/d/7KpXm2RfZwNJgs84QhVYno5DU6iM9Wlr3bCz",
///   "sheet_name": "Roster",
///   "columns": {
///     "name": "Osoba",
///     "troop": "Jednotka",
///     "reg_num": "Registrační číslo",
///     "emails": ["E-mail (hlavní)", "Matka: mail", "Otec: mail"],
///     "ledger": { "mode": "due_paid", "amount_due": "Poplatek", "amount_paid": "Zaplaceno" }
///   },
///   "payment": {
///     "iban": "CZ6508000000192000145399",
///     "ss_prefix": "99",
///     "currency": "CZK",
///     "message_template": "Prispevky {troop_code} {name}",
///     "due_days": 10,
///     "include_due_date": true
///   },
///   "troops": ["Sokol, SK, 07, Jana Vedoucí, vedouci@example.com"],
///   "mail": {
///     "sender_name": "Oddíl",
///     "sender_email": "oddil@example.com",
///     "subject": "Příspěvky {name}",
///     "body_template": "..."
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "dues"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// URL to the roster Google Sheet
    sheet_url: String,

    /// Name of the tab holding the roster
    sheet_name: String,

    /// The roster column mapping
    columns: SchemaConfig,

    /// Payment-order settings
    payment: PaymentConfig,

    /// Troop lines: `name, text code, numeric code, leader name, leader email`
    troops: Vec<String>,

    /// Email templates and sender identity
    mail: MailConfig,

    /// Path to the OAuth 2.0 client credentials file (optional, relative to config.json or
    /// absolute). Defaults to $DUES_HOME/.secrets/client_secret.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret_path: Option<PathBuf>,

    /// Path to the OAuth token file (optional, relative to config.json or absolute)
    /// Defaults to $DUES_HOME/.secrets/token.json if not specified
    #[serde(skip_serializing_if = "Option::is_none")]
    token_path: Option<PathBuf>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            sheet_url: String::new(),
            sheet_name: "Roster".to_string(),
            columns: SchemaConfig::default(),
            payment: PaymentConfig::default(),
            troops: Vec::new(),
            mail: MailConfig::default(),
            client_secret_path: None,
            token_path: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        // Validate app_name
        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    /// Gets the client secret path.
    ///
    /// If the path is relative, it should be interpreted as relative to the config.json file.
    /// If None, defaults to $DUES_HOME/.secrets/client_secret.json
    pub fn client_secret_path(&self) -> PathBuf {
        self.client_secret_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(CLIENT_SECRET_JSON))
    }

    /// Gets the token path.
    ///
    /// If the path is relative, it should be interpreted as relative to the config.json file.
    /// If None, defaults to $DUES_HOME/.secrets/token.json
    pub fn token_path(&self) -> PathBuf {
        self.token_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(TOKEN_JSON))
    }
}

/// Payment-order settings from the `payment` section of config.json.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PaymentConfig {
    /// The collecting account in IBAN form.
    iban: String,

    /// The prefix of every specific symbol; the troop's numeric code is appended to it.
    ss_prefix: String,

    /// When set, every unpaid member is billed this amount. When absent, each member is billed
    /// `amount_due - amount_paid` from the ledger columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fixed_amount: Option<String>,

    /// The currency literal of the payment code's `CC:` field.
    currency: String,

    /// The payment-message template. `{troop_code}` and `{name}` are interpolated.
    message_template: String,

    /// Days from "today" to the payment due date. Computed once per run so that every
    /// notification in a batch shares the same deadline.
    due_days: i64,

    /// Whether to append the `DT:` due-date segment to the payment code.
    include_due_date: bool,
}

impl PaymentConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        iban: impl Into<String>,
        ss_prefix: impl Into<String>,
        fixed_amount: Option<String>,
        currency: impl Into<String>,
        message_template: impl Into<String>,
        due_days: i64,
        include_due_date: bool,
    ) -> Self {
        Self {
            iban: iban.into(),
            ss_prefix: ss_prefix.into(),
            fixed_amount,
            currency: currency.into(),
            message_template: message_template.into(),
            due_days,
            include_due_date,
        }
    }

    pub fn iban(&self) -> &str {
        &self.iban
    }

    pub fn ss_prefix(&self) -> &str {
        &self.ss_prefix
    }

    pub fn fixed_amount(&self) -> Option<&str> {
        self.fixed_amount.as_deref()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn message_template(&self) -> &str {
        &self.message_template
    }

    pub fn due_days(&self) -> i64 {
        self.due_days
    }

    pub fn include_due_date(&self) -> bool {
        self.include_due_date
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            iban: String::new(),
            ss_prefix: "99".to_string(),
            fixed_amount: None,
            currency: "CZK".to_string(),
            message_template: "Prispevky {troop_code} {name}".to_string(),
            due_days: 10,
            include_due_date: true,
        }
    }
}

/// Email templates and sender identity from the `mail` section of config.json.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct MailConfig {
    /// The display name of the sender.
    sender_name: String,

    /// The Gmail address the notifications are sent from. This must be the account that was
    /// authorized during `dues auth`.
    sender_email: String,

    /// The subject template. The same placeholders as `body_template` are interpolated.
    subject: String,

    /// The body template. Placeholders: `{name}`, `{troop}`, `{amount}`, `{currency}`,
    /// `{due_date}`, `{account}`, `{iban}`, `{vs}`, `{ss}`, `{message}`, `{payment_code}`.
    body_template: String,
}

impl MailConfig {
    pub fn new(
        sender_name: impl Into<String>,
        sender_email: impl Into<String>,
        subject: impl Into<String>,
        body_template: impl Into<String>,
    ) -> Self {
        Self {
            sender_name: sender_name.into(),
            sender_email: sender_email.into(),
            subject: subject.into(),
            body_template: body_template.into(),
        }
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn sender_email(&self) -> &str {
        &self.sender_email
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body_template(&self) -> &str {
        &self.body_template
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender_name: String::new(),
            sender_email: String::new(),
            subject: "Příspěvky: {name}".to_string(),
            body_template: "Dobrý den,\n\n\
                prosíme o zaplacení příspěvků za {name} ({troop}).\n\n\
                Částka: {amount} {currency}\n\
                Účet: {account}\n\
                Variabilní symbol: {vs}\n\
                Specifický symbol: {ss}\n\
                Zpráva pro příjemce: {message}\n\
                Splatnost: {due_date}\n\n\
                Platbu lze zadat načtením QR kódu: {payment_code}\n"
                .to_string(),
        }
    }
}

/// Extracts the spreadsheet ID from a Google Sheets URL
///
/// # Arguments
/// * `url` - The Google Sheets URL (e.g., "https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...")
///
/// # Returns
/// The spreadsheet ID, or an error if the URL is empty or its format is invalid.
fn extract_spreadsheet_id(url: &str) -> Result<&str> {
    if url.trim().is_empty() {
        bail!("The sheet_url is not configured. Edit config.json and set it to the roster's Google Sheets URL");
    }

    // URL format: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID/...
    // or: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID?foo=bar
    let parts: Vec<&str> = url.split('/').collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == "d" && i + 1 < parts.len() {
            // Extract the ID and remove any query parameters or fragments
            let id_part = parts[i + 1];
            let id = id_part
                .split('?')
                .next()
                .unwrap_or(id_part)
                .split('#')
                .next()
                .unwrap_or(id_part);
            return Ok(id);
        }
    }
    Err(anyhow::anyhow!(
        "Invalid Google Sheets URL format. Expected: https://docs.google.com/spreadsheets/d/SPREADSHEET_ID"
    ))
}
