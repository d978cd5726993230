mod files;
mod mail;
mod oauth;
mod sheet;

// OAuth scopes required by the program. We only ever read the roster, and we only send mail,
// so we ask for the narrowest scopes Google offers for each.
const OAUTH_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/gmail.send",
];

pub(crate) use mail::{Gmail, Mailer, OutgoingEmail};
pub(crate) use oauth::TokenProvider;
pub(crate) use sheet::{GoogleSheet, Sheet};
