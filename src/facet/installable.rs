// src/facet/installable.rs

//! Installability: applicable content a host can actually install
//!
//! An applicable erratum or RPM is installable when it is present in at
//! least one repository the host is bound to. Nothing here is stored; every
//! answer is recomputed from the applicability snapshot and the bindings.

use crate::db::models::{ContentFacet, Erratum, InstalledPackage, Rpm};
use crate::error::Result;
use crate::version::{Nevra, RpmVersion};
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

impl ContentFacet {
    /// Applicable errata present in a bound repository
    pub fn installable_errata(&self, conn: &Connection) -> Result<Vec<Erratum>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM errata e
             JOIN content_facet_errata cfe ON cfe.erratum_id = e.id
             WHERE cfe.content_facet_id = ?1
               AND EXISTS (
                 SELECT 1 FROM repository_errata re
                 JOIN content_facet_repositories cfr ON cfr.repository_id = re.repository_id
                 WHERE re.erratum_id = e.id AND cfr.content_facet_id = ?1)
             ORDER BY e.errata_id",
            Erratum::columns("e")
        ))?;
        let errata = stmt
            .query_map([facet_id], Erratum::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(errata)
    }

    /// Applicable RPMs present in a bound repository
    pub fn installable_rpms(&self, conn: &Connection) -> Result<Vec<Rpm>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rpms r
             JOIN content_facet_rpms cfr ON cfr.rpm_id = r.id
             WHERE cfr.content_facet_id = ?1
               AND EXISTS (
                 SELECT 1 FROM repository_rpms rr
                 JOIN content_facet_repositories cfb ON cfb.repository_id = rr.repository_id
                 WHERE rr.rpm_id = r.id AND cfb.content_facet_id = ?1)
             ORDER BY r.nvra",
            Rpm::columns("r")
        ))?;
        let rpms = stmt
            .query_map([facet_id], Rpm::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rpms)
    }

    /// Applicable errata that would be installable from a content source
    ///
    /// Evaluated against the repositories of the given view and environment
    /// instead of the bound set. The facet is not modified.
    pub fn installable_errata_in(
        &self,
        conn: &Connection,
        content_view_id: i64,
        lifecycle_environment_id: i64,
    ) -> Result<Vec<Erratum>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM errata e
             JOIN content_facet_errata cfe ON cfe.erratum_id = e.id
             WHERE cfe.content_facet_id = ?1
               AND EXISTS (
                 SELECT 1 FROM repository_errata re
                 JOIN repositories repo ON repo.id = re.repository_id
                 WHERE re.erratum_id = e.id
                   AND repo.content_view_id = ?2
                   AND repo.lifecycle_environment_id = ?3)
             ORDER BY e.errata_id",
            Erratum::columns("e")
        ))?;
        let errata = stmt
            .query_map(
                params![facet_id, content_view_id, lifecycle_environment_id],
                Erratum::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(errata)
    }

    pub fn installable_rpms_in(
        &self,
        conn: &Connection,
        content_view_id: i64,
        lifecycle_environment_id: i64,
    ) -> Result<Vec<Rpm>> {
        let facet_id = self.require_id()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rpms r
             JOIN content_facet_rpms cfr ON cfr.rpm_id = r.id
             WHERE cfr.content_facet_id = ?1
               AND EXISTS (
                 SELECT 1 FROM repository_rpms rr
                 JOIN repositories repo ON repo.id = rr.repository_id
                 WHERE rr.rpm_id = r.id
                   AND repo.content_view_id = ?2
                   AND repo.lifecycle_environment_id = ?3)
             ORDER BY r.nvra",
            Rpm::columns("r")
        ))?;
        let rpms = stmt
            .query_map(
                params![facet_id, content_view_id, lifecycle_environment_id],
                Rpm::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rpms)
    }

    /// Installable RPMs that upgrade a currently installed package
    ///
    /// An RPM qualifies when an installed package has the same name and
    /// arch and a strictly lower EVR. When the host did not report the
    /// installed epoch, only version and release are compared.
    pub fn upgradable_rpms(&self, conn: &Connection) -> Result<Vec<Rpm>> {
        let installed: Vec<(Nevra, bool)> = InstalledPackage::list_for_host(conn, self.host_id)?
            .into_iter()
            .filter_map(|pkg| match pkg.nevra() {
                Ok(nevra) => Some((nevra, pkg.reports_epoch())),
                Err(e) => {
                    debug!("Skipping installed package '{}': {}", pkg.nvra, e);
                    None
                }
            })
            .collect();

        let upgradable = self
            .installable_rpms(conn)?
            .into_iter()
            .filter(|rpm| {
                let candidate = rpm.nevra();
                installed.iter().any(|(pkg, epoch_known)| {
                    pkg.same_stream(&candidate) && older_than(pkg, *epoch_known, &candidate)
                })
            })
            .collect();
        Ok(upgradable)
    }

    /// Facets for which any of `erratum_ids` is installable
    pub fn with_installable_errata(conn: &Connection, erratum_ids: &[i64]) -> Result<Vec<Self>> {
        Self::by_errata(conn, erratum_ids, "EXISTS")
    }

    /// Facets for which any of `erratum_ids` is applicable but not in a
    /// bound repository
    pub fn with_non_installable_errata(conn: &Connection, erratum_ids: &[i64]) -> Result<Vec<Self>> {
        Self::by_errata(conn, erratum_ids, "NOT EXISTS")
    }

    fn by_errata(conn: &Connection, erratum_ids: &[i64], exists: &str) -> Result<Vec<Self>> {
        if erratum_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; erratum_ids.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {} FROM content_facets cf
             JOIN content_facet_errata cfe ON cfe.content_facet_id = cf.id
             WHERE cfe.erratum_id IN ({placeholders})
               AND {exists} (
                 SELECT 1 FROM repository_errata re
                 JOIN content_facet_repositories cfr ON cfr.repository_id = re.repository_id
                 WHERE re.erratum_id = cfe.erratum_id AND cfr.content_facet_id = cf.id)
             ORDER BY cf.id",
            Self::columns("cf")
        ))?;
        let facets = stmt
            .query_map(params_from_iter(erratum_ids.iter()), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(facets)
    }
}

fn older_than(installed: &Nevra, epoch_known: bool, candidate: &Nevra) -> bool {
    if epoch_known {
        return installed.evr < candidate.evr;
    }
    let candidate = RpmVersion {
        epoch: installed.evr.epoch,
        ..candidate.evr.clone()
    };
    installed.evr < candidate
}
