//! Organization repository contracts and SQLite implementation.
//!
//! # Invariants
//! - `links` is persisted as a JSON array and must parse back on read.
//! - Deleting an organization that still owns events is rejected by the
//!   foreign key; cascades go through the cascade service.

use super::{EntityKind, RepoError, RepoResult};
use crate::model::organization::{validate_links, NewOrganization, Organization, OrganizationLink};
use rusqlite::{params, Connection, OptionalExtension, Row};

const ORGANIZATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    campus,
    links,
    created_at,
    updated_at
FROM organizations";

/// Repository interface for organization records.
pub trait OrganizationRepository {
    fn create_organization(&self, organization: &NewOrganization) -> RepoResult<Organization>;
    fn get_organization(&self, id: &str) -> RepoResult<Option<Organization>>;
    fn list_organizations(&self) -> RepoResult<Vec<Organization>>;
    fn rename_organization(&self, id: &str, name: &str) -> RepoResult<()>;
    fn update_links(&self, id: &str, links: &[OrganizationLink]) -> RepoResult<()>;
    /// Returns `false` when no row matched.
    fn delete_organization(&self, id: &str) -> RepoResult<bool>;
}

/// SQLite-backed organization repository.
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        super::ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates repository on a connection already checked by the caller.
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn create_organization(&self, organization: &NewOrganization) -> RepoResult<Organization> {
        organization.validate()?;

        self.conn.execute(
            "INSERT INTO organizations (id, name, campus, links)
             VALUES (?1, ?2, ?3, '[]');",
            params![
                organization.id.trim(),
                organization.name.trim(),
                organization.campus.as_deref(),
            ],
        )?;

        self.get_organization(organization.id.trim())?
            .ok_or_else(|| RepoError::not_found(EntityKind::Organization, organization.id.trim()))
    }

    fn get_organization(&self, id: &str) -> RepoResult<Option<Organization>> {
        self.conn
            .query_row(
                &format!("{ORGANIZATION_SELECT_SQL} WHERE id = ?1;"),
                [id],
                |row| Ok(parse_organization_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_organizations(&self) -> RepoResult<Vec<Organization>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORGANIZATION_SELECT_SQL} ORDER BY name ASC, id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut organizations = Vec::new();
        while let Some(row) = rows.next()? {
            organizations.push(parse_organization_row(row)?);
        }
        Ok(organizations)
    }

    fn rename_organization(&self, id: &str, name: &str) -> RepoResult<()> {
        crate::model::require_non_blank("name", name)?;
        let changed = self.conn.execute(
            "UPDATE organizations
             SET name = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, name.trim()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Organization, id));
        }
        Ok(())
    }

    fn update_links(&self, id: &str, links: &[OrganizationLink]) -> RepoResult<()> {
        validate_links(links)?;
        let encoded = serde_json::to_string(links)
            .map_err(|err| RepoError::InvalidData(format!("cannot encode links: {err}")))?;
        let changed = self.conn.execute(
            "UPDATE organizations
             SET links = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, encoded],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found(EntityKind::Organization, id));
        }
        Ok(())
    }

    fn delete_organization(&self, id: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM organizations WHERE id = ?1;", [id])?;
        Ok(changed > 0)
    }
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    let links_text: String = row.get("links")?;
    let links: Vec<OrganizationLink> = serde_json::from_str(&links_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid links json in organizations.links: {err}"))
    })?;

    Ok(Organization {
        id: row.get("id")?,
        name: row.get("name")?,
        campus: row.get("campus")?,
        links,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
