//! Cross-scope license sharing.

use std::collections::HashSet;

use super::{write_failed, Result, RightsServiceImpl};
use crate::error::RightsError;
use crate::types::{LicenseShare, LicenseSummary, SharedLicenseLine, SharedLicensesRequest};
use crate::validate::lookup_failed;

fn not_available() -> RightsError {
    RightsError::invalid("LicencesNotAvailable")
}

/// Reject a sharing request that would hand out more than the owner holds.
///
/// Lines are absolute: each sets the count a receiving scope should hold. A
/// zero line reclaims that scope's current share. Scopes not listed keep theirs.
pub fn check_conservation(summary: &LicenseSummary, lines: &[SharedLicenseLine]) -> Result<()> {
    let requested: i64 = lines.iter().map(|l| i64::from(l.shared_licenses)).sum();
    let total_shared = i64::from(summary.total_shared_licenses);
    let available = i64::from(summary.available_licenses);

    let reclaimed: i64 = lines
        .iter()
        .filter(|l| l.shared_licenses == 0)
        .map(|l| i64::from(summary.share_for(&l.recipient_scope)))
        .sum();
    if requested - total_shared > available + reclaimed {
        return Err(not_available());
    }

    // Projected ledger must still fit inside the acquired quantity.
    let unlisted: i64 = summary
        .shares
        .iter()
        .filter(|s| !lines.iter().any(|l| l.recipient_scope == s.scope))
        .map(|s| i64::from(s.shared_licenses))
        .sum();
    if requested + unlisted > available + total_shared {
        return Err(not_available());
    }
    Ok(())
}

fn check_lines(owner_scope: &str, lines: &[SharedLicenseLine]) -> Result<()> {
    let mut seen = HashSet::new();
    for line in lines {
        if line.recipient_scope.is_empty() {
            return Err(RightsError::invalid("recipient scope is required"));
        }
        if line.recipient_scope == owner_scope {
            return Err(RightsError::invalid(
                "licenses cannot be shared with the owning scope",
            ));
        }
        if line.shared_licenses < 0 {
            return Err(RightsError::invalid("shared licenses cannot be negative"));
        }
        if !seen.insert(line.recipient_scope.as_str()) {
            return Err(RightsError::invalid("duplicate recipient scope"));
        }
    }
    Ok(())
}

impl RightsServiceImpl {
    pub(super) async fn share_licenses(
        &self,
        actor: &str,
        req: &SharedLicensesRequest,
    ) -> Result<()> {
        check_lines(&req.scope, &req.lines)?;

        let owner_right = self
            .rights
            .get_aggregated_right(&req.sku, &req.scope)
            .await
            .map_err(|e| lookup_failed("get aggregated right", &req.scope, e))?
            .ok_or_else(|| RightsError::invalid("aggregated right does not exist"))?;

        let summary = self
            .ledger
            .license_summary(&req.sku, &req.scope)
            .await
            .map_err(|e| lookup_failed("license summary", &req.scope, e))?;
        if let Err(e) = check_conservation(&summary, &req.lines) {
            tracing::warn!(
                sku = %req.sku,
                scope = %req.scope,
                available = summary.available_licenses,
                shared = summary.total_shared_licenses,
                "sharing request exceeds available licences"
            );
            return Err(e);
        }

        // Sequential; a failure leaves earlier lines in place.
        for line in &req.lines {
            if line.shared_licenses > 0 {
                self.provision_recipient(actor, &owner_right, &line.recipient_scope)
                    .await?;
            }
            self.ledger
                .upsert_share(&LicenseShare {
                    sku: req.sku.clone(),
                    owner_scope: req.scope.clone(),
                    recipient_scope: line.recipient_scope.clone(),
                    shared_licenses: line.shared_licenses,
                    updated_by: actor.to_string(),
                })
                .await
                .map_err(|e| write_failed("upsert license share", &line.recipient_scope, e))?;
            tracing::info!(
                sku = %req.sku,
                owner = %req.scope,
                recipient = %line.recipient_scope,
                count = line.shared_licenses,
                "license share recorded"
            );
        }
        Ok(())
    }
}
