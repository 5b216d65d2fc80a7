//! GETBULK (RFC 3416 section 4.2.3).
//!
//! Non-repeaters get one successor each. Repeaters are walked row by row,
//! each column with its own cursor, and the response ends at the first
//! column that runs out. The size budget can cut the response short at any
//! varbind.

use crate::error::ErrorStatus;
use crate::notification::NotificationJob;
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::store::{ReadView, Slot};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::variation::ResolveContext;
use crate::version::Version;

use super::{next_slot, too_big};

/// Independent cursors over the repeated columns.
struct Stepper<'v, 's> {
    view: &'v ReadView<'s>,
    cursors: Vec<Oid>,
}

impl<'v, 's> Stepper<'v, 's> {
    fn new(view: &'v ReadView<'s>, columns: &[VarBind]) -> Self {
        Self {
            view,
            cursors: columns.iter().map(|vb| vb.oid.clone()).collect(),
        }
    }

    fn columns(&self) -> usize {
        self.cursors.len()
    }

    /// Advance one column. `Err` carries the cursor that ran out.
    fn step(&mut self, column: usize) -> Result<Slot<'s>, Oid> {
        let cursor = &mut self.cursors[column];
        let Some(slot) = next_slot(self.view, cursor, Version::V2c) else {
            return Err(cursor.clone());
        };
        *cursor = slot.oid.clone();
        Ok(slot)
    }
}

/// Running total against the size budget.
struct Budget {
    remaining: usize,
}

impl Budget {
    /// Resolve `slot` if its widest encoding still fits. A slot that does
    /// not fit is never resolved, so its variation does not run.
    fn resolve(
        &mut self,
        slot: Slot<'_>,
        ctx: &ResolveContext<'_>,
        jobs: &mut Vec<NotificationJob>,
    ) -> Option<VarBind> {
        if slot.max_encoded_size() > self.remaining {
            return None;
        }
        let (value, job) = slot.resolve(ctx);
        jobs.extend(job);
        let vb = VarBind::new(slot.oid, value);
        self.remaining = self.remaining.saturating_sub(vb.encoded_size());
        Some(vb)
    }

    fn take(&mut self, vb: &VarBind) -> bool {
        let size = vb.encoded_size();
        if size > self.remaining {
            return false;
        }
        self.remaining -= size;
        true
    }
}

pub(super) fn get_bulk(
    view: &ReadView<'_>,
    ctx: &ResolveContext<'_>,
    pdu: &Pdu,
    budget: usize,
    jobs: &mut Vec<NotificationJob>,
) -> Pdu {
    let non_repeaters = (pdu.error_status.max(0) as usize).min(pdu.varbinds.len());
    let max_repetitions = pdu.error_index.max(0) as usize;
    let (singles, columns) = pdu.varbinds.split_at(non_repeaters);

    let mut budget = Budget { remaining: budget };
    let mut varbinds = Vec::new();

    for vb in singles {
        let next = match next_slot(view, &vb.oid, Version::V2c) {
            Some(slot) => budget.resolve(slot, ctx, jobs),
            None => {
                let end = VarBind::new(vb.oid.clone(), Value::EndOfMibView);
                budget.take(&end).then_some(end)
            }
        };
        let Some(next) = next else {
            return finish(pdu, varbinds, true);
        };
        varbinds.push(next);
    }

    let mut truncated = false;
    let mut stepper = Stepper::new(view, columns);
    'rows: for _ in 0..max_repetitions {
        for column in 0..stepper.columns() {
            let slot = match stepper.step(column) {
                Ok(slot) => slot,
                Err(exhausted) => {
                    if varbinds.is_empty() {
                        varbinds.push(VarBind::new(exhausted, Value::EndOfMibView));
                    }
                    break 'rows;
                }
            };
            let Some(next) = budget.resolve(slot, ctx, jobs) else {
                truncated = true;
                break 'rows;
            };
            varbinds.push(next);
        }
    }

    finish(pdu, varbinds, truncated)
}

/// A response cut down to nothing by the budget is tooBig.
fn finish(pdu: &Pdu, varbinds: Vec<VarBind>, truncated: bool) -> Pdu {
    if truncated && varbinds.is_empty() {
        return too_big(pdu);
    }
    Pdu::response(pdu.request_id, varbinds)
}
