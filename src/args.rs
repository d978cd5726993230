//! These structs provide the CLI interface for the dues CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// dues: a command-line tool for collecting membership fees.
///
/// The purpose of this program is to reconcile a membership roster kept in a Google sheet against
/// its payment ledger columns, and to email each unpaid member a bank payment order together with
/// a QR Platba payment code (https://qr-platba.cz/) that pre-fills the transfer in their banking
/// app.
///
/// You will need to set up a Google Cloud OAuth client for the Sheets and Gmail APIs. Run
/// `dues init` first, then `dues auth`, then edit config.json with your columns, troops, and
/// payment details.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. You need two things ready beforehand:
    ///
    /// - The URL of the Google sheet holding your roster, passed as --sheet-url.
    ///
    /// - Your downloaded Google OAuth client credentials JSON, passed as --client-secret. The file
    ///   will be moved into the data directory.
    ///
    /// After init, edit config.json in the data directory: set the column names of your sheet,
    /// your troops, and the payment section (IBAN, specific-symbol prefix, message template).
    Init(InitArgs),
    /// Authenticate with the Google Sheets and Gmail APIs via OAuth.
    Auth(AuthArgs),
    /// Classify the roster and email payment orders to unpaid members.
    Notify(NotifyArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where dues data and configuration is held. Defaults to ~/dues
    #[arg(long, env = "DUES_HOME", default_value_t = default_dues_home())]
    dues_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, dues_home: PathBuf) -> Self {
        Self {
            log_level,
            dues_home: dues_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn dues_home(&self) -> &DisplayPath {
        &self.dues_home
    }
}

/// Args for the `dues init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The URL to the roster Google sheet. It looks like this:
    /// https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5OcGnWsT6iDuE3VhMjX
    #[arg(long)]
    sheet_url: String,

    /// The path to your downloaded OAuth client credentials. This file will be moved to the
    /// default secrets location in the data directory.
    #[arg(long)]
    client_secret: PathBuf,
}

impl InitArgs {
    pub fn new(sheet_url: impl Into<String>, client_secret: impl Into<PathBuf>) -> Self {
        Self {
            sheet_url: sheet_url.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn sheet_url(&self) -> &str {
        &self.sheet_url
    }

    pub fn client_secret(&self) -> &Path {
        &self.client_secret
    }
}

/// Args for the `dues auth` command.
#[derive(Debug, Parser, Clone)]
pub struct AuthArgs {
    /// Verify and refresh authentication without opening a browser.
    #[arg(long)]
    verify: bool,
}

impl AuthArgs {
    pub fn new(verify: bool) -> Self {
        Self { verify }
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

/// Args for the `dues notify` command.
#[derive(Debug, Parser, Clone)]
pub struct NotifyArgs {
    /// Actually send the emails. Without this flag the command performs a dry run: it classifies
    /// the roster, builds and logs every payment order, but sends nothing.
    #[arg(long)]
    send: bool,
}

impl NotifyArgs {
    pub fn new(send: bool) -> Self {
        Self { send }
    }

    pub fn send(&self) -> bool {
        self.send
    }
}

fn default_dues_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("dues"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --dues-home or DUES_HOME instead of relying on the default \
                dues home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("dues")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
