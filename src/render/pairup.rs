//! Request/reply pairing output.
//!
//! Joins each request with its reply into one JSON object:
//! ```text
//! {"UNIQUE":5,"OP":"LOOKUP","REQUEST":[..],"RESPONSE":[..],"Truncated":false}
//! ```
//! `FORGET` and `BATCH_FORGET` are emitted alone, as are notifications
//! (under `REVERSE_REQUEST`). Requests are held until their reply arrives;
//! whatever is still held at the end is reported as unanswered.

use std::collections::HashMap;
use std::io::Write;

use serde::Serialize;

use super::{write_line, MsgView, Render};
use crate::error::Result;
use crate::protocol::Direction;
use crate::Record;

#[derive(Serialize)]
struct Pair<'a> {
    #[serde(rename = "UNIQUE")]
    unique: u64,
    #[serde(rename = "OP")]
    op: &'a str,
    #[serde(rename = "REQUEST", skip_serializing_if = "Option::is_none")]
    request: Option<MsgView<'a>>,
    #[serde(rename = "REVERSE_REQUEST", skip_serializing_if = "Option::is_none")]
    reverse_request: Option<MsgView<'a>>,
    #[serde(rename = "RESPONSE", skip_serializing_if = "Option::is_none")]
    response: Option<MsgView<'a>>,
    #[serde(rename = "Truncated")]
    truncated: bool,
}

/// Renderer pairing requests with replies.
pub struct PairUpRenderer<W> {
    out: W,
    limit: usize,
    pending: HashMap<u64, Record>,
}

impl<W: Write> PairUpRenderer<W> {
    pub fn new(out: W, limit: usize) -> Self {
        Self {
            out,
            limit,
            pending: HashMap::new(),
        }
    }

    /// Requests held back waiting for a reply.
    pub fn waiting(&self) -> usize {
        self.pending.len()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, pair: &Pair<'_>) -> Result<()> {
        let line = serde_json::to_vec(pair)?;
        write_line(&mut self.out, &line)
    }

    fn emit_alone(&mut self, record: &Record, op: &str, reverse: bool) -> Result<()> {
        let msg = MsgView::new(record, self.limit).without_opname();
        let truncated = msg.truncated();
        let (request, reverse_request) = if reverse {
            (None, Some(msg))
        } else {
            (Some(msg), None)
        };
        self.emit(&Pair {
            unique: record.unique(),
            op,
            request,
            reverse_request,
            response: None,
            truncated,
        })
    }
}

impl<W: Write> Render for PairUpRenderer<W> {
    fn render(&mut self, record: &Record) -> Result<()> {
        let unique = record.unique();
        match record.opname.as_deref() {
            Some(op @ ("FORGET" | "BATCH_FORGET")) => self.emit_alone(record, op, false),
            Some(op) if op.starts_with("NOTIFY_") => self.emit_alone(record, op, true),
            Some(_) if record.direction == Direction::Request => {
                self.pending.insert(unique, record.clone());
                Ok(())
            }
            _ => {
                let Some(request) = self.pending.remove(&unique) else {
                    tracing::warn!(unique, "missing request for reply");
                    return Ok(());
                };
                let req = MsgView::new(&request, self.limit).without_opname();
                let resp = MsgView::new(record, self.limit).without_opname();
                let truncated = req.truncated() || resp.truncated();
                let op = request.opname.as_deref().unwrap_or_default();
                let line = serde_json::to_vec(&Pair {
                    unique,
                    op,
                    request: Some(req),
                    reverse_request: None,
                    response: Some(resp),
                    truncated,
                })?;
                write_line(&mut self.out, &line)
            }
        }
    }

    fn finish(&mut self) -> Result<()> {
        let mut unanswered: Vec<_> = self.pending.iter().collect();
        unanswered.sort_by_key(|(unique, _)| **unique);
        for (unique, request) in unanswered {
            tracing::warn!(
                unique,
                op = request.opname.as_deref().unwrap_or_default(),
                "no response found for request"
            );
        }
        self.out.flush()?;
        Ok(())
    }
}
