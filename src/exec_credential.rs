use crate::token::Token;
use anyhow::{Context, Result};
use chrono::SecondsFormat;
use serde::Serialize;
use std::io::Write;

pub(crate) const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1";

/// client.authentication.k8s.io/v1 ExecCredential, reduced to what kubectl needs from us
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredential<'a> {
    api_version: &'static str,
    kind: &'static str,
    status: ExecCredentialStatus<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus<'a> {
    expiration_timestamp: String,
    token: &'a str,
}

pub(crate) fn render(token: &Token) -> Result<Vec<u8>> {
    let mut document = serde_json::to_vec(&ExecCredential {
        api_version: EXEC_API_VERSION,
        kind: "ExecCredential",
        status: ExecCredentialStatus {
            expiration_timestamp: token.expiry.to_rfc3339_opts(SecondsFormat::Secs, true),
            token: &token.access_token,
        },
    })
    .context("serializing ExecCredential")?;
    document.push(b'\n');

    Ok(document)
}

/// Writes the whole document in one go. A half written credential looks like a hung plugin to
/// kubectl, so nothing is written unless serialization fully succeeded.
pub(crate) fn respond(token: &Token, out: &mut dyn Write) -> Result<()> {
    let document = render(token)?;
    out.write_all(&document).context("writing ExecCredential")?;
    out.flush().context("flushing ExecCredential")?;

    Ok(())
}
