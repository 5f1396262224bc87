//! Visibility of providers, workshops, applications and changes logs for
//! ministry, region and area administrators.

use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::{AdminRepository, Filter};
use crate::models::{AdminKind, Role};
use crate::services::CodeficatorService;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminScope {
    /// Tech admins see everything.
    Unrestricted,
    /// Ministry admins see one institution.
    Institution(Uuid),
    /// Region and area admins see one institution within a territory. An
    /// empty id set places no geographic restriction.
    Territory {
        institution_id: Uuid,
        catottg_ids: Vec<i64>,
    },
    /// Users without an admin record see nothing.
    Nothing,
}

impl AdminScope {
    /// Resolves the scope of `user` from their admin record.
    pub async fn resolve(
        user: &CurrentUser,
        admins: &AdminRepository,
        codeficator: &CodeficatorService,
    ) -> Result<Self> {
        let kind = match user.role {
            Role::TechAdmin => return Ok(AdminScope::Unrestricted),
            Role::MinistryAdmin => AdminKind::Ministry,
            Role::RegionAdmin => AdminKind::Region,
            Role::AreaAdmin => AdminKind::Area,
            Role::Parent | Role::Provider => return Ok(AdminScope::Nothing),
        };

        let filter = Filter::eq("ad.user_id", user.user_id.as_str())
            .and(Filter::eq("ad.kind", kind.as_str()));
        let Some(admin) = admins.get_by_filter(filter).await?.into_iter().next() else {
            tracing::warn!(user_id = %user.user_id, ?kind, "Admin record not found, nothing is visible");
            return Ok(AdminScope::Nothing);
        };

        if kind == AdminKind::Ministry {
            return Ok(AdminScope::Institution(admin.institution_id));
        }
        let catottg_ids = match admin.catottg_id {
            Some(id) => codeficator.all_children_ids(id).await?.to_vec(),
            None => Vec::new(),
        };
        Ok(AdminScope::Territory {
            institution_id: admin.institution_id,
            catottg_ids,
        })
    }

    /// Predicate over an institution column and a CATOTTG column.
    pub fn filter(&self, institution_column: &'static str, catottg_column: &'static str) -> Filter {
        match self {
            AdminScope::Unrestricted => Filter::True,
            AdminScope::Institution(id) => Filter::eq(institution_column, *id),
            AdminScope::Territory {
                institution_id,
                catottg_ids,
            } => {
                let institution = Filter::eq(institution_column, *institution_id);
                if catottg_ids.is_empty() {
                    institution
                } else {
                    institution.and(Filter::is_in(catottg_column, catottg_ids.clone()))
                }
            }
            AdminScope::Nothing => Filter::False,
        }
    }

    /// Whether an entity with the given institution and CATOTTG is visible.
    pub fn contains(&self, institution_id: Option<Uuid>, catottg_id: i64) -> bool {
        match self {
            AdminScope::Unrestricted => true,
            AdminScope::Institution(id) => institution_id == Some(*id),
            AdminScope::Territory {
                institution_id: scope_institution,
                catottg_ids,
            } => {
                institution_id == Some(*scope_institution)
                    && (catottg_ids.is_empty() || catottg_ids.contains(&catottg_id))
            }
            AdminScope::Nothing => false,
        }
    }

    pub fn providers(&self) -> Filter {
        self.filter("p.institution_id", "p.legal_catottg_id")
    }

    pub fn workshops(&self) -> Filter {
        self.filter("p.institution_id", "w.catottg_id")
    }

    pub fn applications(&self) -> Filter {
        self.filter("p.institution_id", "p.legal_catottg_id")
    }

    pub fn provider_changes(&self) -> Filter {
        self.filter("lp.institution_id", "lp.legal_catottg_id")
    }

    pub fn application_changes(&self) -> Filter {
        self.filter("lap.institution_id", "lap.legal_catottg_id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::{Postgres, QueryBuilder};

    fn sql(filter: Filter) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("");
        filter.push_to(&mut qb);
        qb.sql().to_string()
    }

    #[test]
    fn unrestricted_and_nothing_are_constant_predicates() {
        assert_eq!(sql(AdminScope::Unrestricted.providers()), "TRUE");
        assert_eq!(sql(AdminScope::Nothing.providers()), "FALSE");
    }

    #[test]
    fn territory_adds_catottg_restriction_only_when_known() {
        let institution_id = Uuid::new_v4();
        let open = AdminScope::Territory {
            institution_id,
            catottg_ids: Vec::new(),
        };
        assert_eq!(sql(open.workshops()), "p.institution_id = $1");

        let limited = AdminScope::Territory {
            institution_id,
            catottg_ids: vec![10, 11],
        };
        let rendered = sql(limited.workshops());
        assert!(rendered.contains("p.institution_id = $1"));
        assert!(rendered.contains("w.catottg_id = ANY($2)"));
    }

    #[test]
    fn contains_checks_institution_and_territory() {
        let institution_id = Uuid::new_v4();
        let territory = AdminScope::Territory {
            institution_id,
            catottg_ids: vec![10, 11],
        };
        assert!(territory.contains(Some(institution_id), 10));
        assert!(!territory.contains(Some(institution_id), 12));
        assert!(!territory.contains(None, 10));
        assert!(AdminScope::Institution(institution_id).contains(Some(institution_id), 99));
        assert!(AdminScope::Unrestricted.contains(None, 1));
        assert!(!AdminScope::Nothing.contains(Some(institution_id), 10));
    }
}
