//! Fetch-and-forward cycle: list PDUs, decode, reassemble, filter, deliver.

use log::{debug, warn};

use crate::at::{AtSession, AtSessionError, AtTransport};
use crate::exclusion::ExclusionSet;
use crate::pdu::parse_pdu;
use crate::reassembly::build_sms_list;
use crate::sink::Sink;

/// Build the webhook `content` field: timestamp followed by the decoded
/// body. The sender itself travels separately as the `title` field (§4.H).
fn render_content(timestamp: &str, message: &str) -> String {
    format!("{timestamp}\n{message}")
}

/// Parse a `CMGL` listing body into the hex PDU lines it carries. Tracks a
/// "next non-blank line is a PDU" flag set by a `+CMGL:` line, per §4.E.
fn extract_pdu_lines(body: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut next_is_pdu = false;
    for raw_line in body.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.contains("OK") {
            break;
        }
        if line.starts_with("+CMGL:") {
            next_is_pdu = true;
            continue;
        }
        if next_is_pdu {
            out.push(line);
            next_is_pdu = false;
        }
    }
    out
}

/// Run one poll-decode-reassemble-filter-deliver cycle. Decode and delivery
/// failures for an individual record are logged and skipped; only
/// `AtTimeout` / `AtError` abort the cycle, per §7.
pub async fn run_cycle<T: AtTransport>(
    session: &mut AtSession<T>,
    cmgl_state: u8,
    exclusions: &dyn ExclusionSet,
    sink: &dyn Sink,
) -> Result<usize, AtSessionError> {
    let body = session.list_sms_pdu(cmgl_state).await?;

    let records: Vec<_> = extract_pdu_lines(&body)
        .into_iter()
        .filter_map(|hex| match parse_pdu(hex) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("dropping unparsable PDU: {}", e);
                None
            }
        })
        .collect();

    let sms_list = build_sms_list(&records);

    let mut delivered = 0;
    for sms in sms_list {
        if exclusions.contains(&sms.from_number).await {
            debug!("excluding sms from {}", sms.from_number);
            continue;
        }
        let content = render_content(&sms.timestamp, &sms.message);
        if let Err(e) = sink.deliver(&sms.from_number, &content).await {
            warn!("sink delivery failed: {}", e);
            continue;
        }
        delivered += 1;
    }

    Ok(delivered)
}
