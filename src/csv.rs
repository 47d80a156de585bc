use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::listing::{DEFAULT_POINT_VALUE, ListingStatus};
use crate::model::{AccountId, Command, ListingId, SwapId};
use crate::{AccountSnapshot, Points};

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized op '{op}'")]
    UnrecognizedOp { line: usize, op: String },

    #[error("line {line}: {op} missing {field}")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },

    #[error("line {line}: {op} has invalid {field} '{value}'")]
    InvalidField {
        line: usize,
        op: String,
        field: &'static str,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    account: Option<AccountId>,
    referrer: Option<AccountId>,
    listing: Option<ListingId>,
    receiver: Option<AccountId>,
    swap: Option<SwapId>,
    points: Option<i64>,
    status: Option<String>,
    title: Option<String>,
    description: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    account: AccountId,
    balance: String,
    version: u64,
    disabled: bool,
}

/// Field accessors that turn an absent column into a line-tagged error.
impl InputRow {
    fn account(&self, line: usize) -> Result<AccountId, CsvError> {
        self.account.ok_or_else(|| self.missing(line, "account"))
    }

    fn listing(&self, line: usize) -> Result<ListingId, CsvError> {
        self.listing.ok_or_else(|| self.missing(line, "listing"))
    }

    fn swap(&self, line: usize) -> Result<SwapId, CsvError> {
        self.swap.ok_or_else(|| self.missing(line, "swap"))
    }

    fn token(&self, line: usize) -> Result<String, CsvError> {
        self.token.clone().ok_or_else(|| self.missing(line, "token"))
    }

    fn missing(&self, line: usize, field: &'static str) -> CsvError {
        CsvError::MissingField {
            line,
            op: self.op.clone(),
            field,
        }
    }
}

/// Read commands from a csv file
pub fn read_commands(path: impl AsRef<Path>) -> impl Iterator<Item = Result<Command, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            match row.op.as_str() {
                "open" => Ok(Command::Open {
                    account: row.account(line)?,
                    referrer: row.referrer,
                }),
                "disable" => Ok(Command::Disable {
                    account: row.account(line)?,
                    token: row.token(line)?,
                }),
                "enable" => Ok(Command::Enable {
                    account: row.account(line)?,
                    token: row.token(line)?,
                }),
                "award" => {
                    let points = row.points.ok_or_else(|| row.missing(line, "points"))?;
                    Ok(Command::Award {
                        account: row.account(line)?,
                        points: Points::new(points),
                        description: row.description.clone().unwrap_or_default(),
                        token: row.token(line)?,
                    })
                }
                "listing" => {
                    let title = row.title.clone().ok_or_else(|| row.missing(line, "title"))?;
                    let value = row.points.map(Points::new).unwrap_or(DEFAULT_POINT_VALUE);
                    Ok(Command::Listing {
                        listing: row.listing(line)?,
                        title,
                        value,
                        token: row.token(line)?,
                    })
                }
                "moderate" => {
                    let raw = row.status.clone().ok_or_else(|| row.missing(line, "status"))?;
                    let status =
                        ListingStatus::parse(&raw).ok_or_else(|| CsvError::InvalidField {
                            line,
                            op: row.op.clone(),
                            field: "status",
                            value: raw,
                        })?;
                    Ok(Command::Moderate {
                        listing: row.listing(line)?,
                        status,
                        token: row.token(line)?,
                    })
                }
                "propose" => Ok(Command::Propose {
                    listing: row.listing(line)?,
                    receiver: row.receiver.ok_or_else(|| row.missing(line, "receiver"))?,
                    token: row.token(line)?,
                }),
                "complete" => Ok(Command::Complete {
                    swap: row.swap(line)?,
                    token: row.token(line)?,
                }),
                "cancel" => Ok(Command::Cancel {
                    swap: row.swap(line)?,
                    token: row.token(line)?,
                }),
                "reconcile" => Ok(Command::Reconcile {
                    account: row.account(line)?,
                    token: row.token(line)?,
                }),
                other => Err(CsvError::UnrecognizedOp {
                    line,
                    op: other.to_string(),
                }),
            }
        })
}

/// write account balances to stdout in csv format
pub fn write_accounts(accounts: impl IntoIterator<Item = AccountSnapshot>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for snapshot in accounts {
        let row = OutputRow {
            account: snapshot.account,
            balance: snapshot.balance.to_string(),
            version: snapshot.version,
            disabled: snapshot.disabled,
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
