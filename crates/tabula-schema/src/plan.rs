//! Resolved change plans.
//!
//! A [`TablePlan`] is the output of the resolver: the fully merged
//! target definition plus everything a dialect needs to render ordered
//! DDL — which objects were added, altered or dropped, the old→new
//! column name mapping, and the dependent tables whose foreign keys must
//! be regenerated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::change::ColumnPosition;
use crate::schema::{Catalog, Table};

/// Another table whose foreign keys are affected by this change and
/// must be regenerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependentRewrite {
    /// The dependent table's updated definition (constraint references
    /// already re-pointed at the new column and table names).
    pub table: Table,
    /// Constraint names whose column references or target table
    /// changed. MySQL re-creates exactly these; SQLite rebuilds the
    /// whole table.
    pub rewritten: Vec<String>,
    /// True when a referenced column changed definition without a
    /// rename. SQLite still rebuilds; MySQL needs no DDL.
    pub retyped: bool,
}

/// The resolved plan for one table change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TablePlan {
    /// True when the plan builds a new table.
    pub create: bool,
    /// The table's current name (differs from `table.name` on rename).
    pub old_name: String,
    /// The merged target definition.
    pub table: Table,
    /// Old column name → new column name, for renames.
    pub column_renames: BTreeMap<String, String>,
    /// Columns removed by the change.
    pub dropped_columns: Vec<String>,
    /// Columns added by the change (final names).
    pub added_columns: Vec<String>,
    /// Columns altered by the change (final names, including pure
    /// renames).
    pub altered_columns: Vec<String>,
    /// Altered columns whose definition changed, not just their name
    /// (final names). These force a rebuild on SQLite.
    pub redefined_columns: Vec<String>,
    /// Explicitly requested column positions (final name → position,
    /// anchors resolved to final names).
    pub positions: BTreeMap<String, ColumnPosition>,
    /// Indexes removed by the change.
    pub dropped_indexes: Vec<String>,
    /// Indexes added by the change.
    pub added_indexes: Vec<String>,
    /// Indexes altered by the change.
    pub altered_indexes: Vec<String>,
    /// Foreign keys removed by the change.
    pub dropped_foreign_keys: Vec<String>,
    /// Foreign keys added by the change.
    pub added_foreign_keys: Vec<String>,
    /// Foreign keys altered by the change.
    pub altered_foreign_keys: Vec<String>,
    /// True when engine/charset/collation changed.
    pub options_changed: bool,
    /// Other tables whose foreign keys must be regenerated.
    pub dependents: Vec<DependentRewrite>,
}

impl TablePlan {
    /// True when the table is being renamed.
    #[must_use]
    pub fn renamed(&self) -> bool {
        self.old_name != self.table.name
    }

    /// True when the plan changes nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.create
            && !self.renamed()
            && !self.options_changed
            && self.dropped_columns.is_empty()
            && self.added_columns.is_empty()
            && self.altered_columns.is_empty()
            && self.dropped_indexes.is_empty()
            && self.added_indexes.is_empty()
            && self.altered_indexes.is_empty()
            && self.dropped_foreign_keys.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.altered_foreign_keys.is_empty()
            && self.dependents.is_empty()
    }

    /// True when any foreign key was added, altered or dropped.
    #[must_use]
    pub fn foreign_keys_changed(&self) -> bool {
        !self.dropped_foreign_keys.is_empty()
            || !self.added_foreign_keys.is_empty()
            || !self.altered_foreign_keys.is_empty()
    }

    /// Returns the previous name of a (possibly renamed) final column
    /// name.
    #[must_use]
    pub fn old_column_name<'a>(&'a self, final_name: &'a str) -> &'a str {
        self.column_renames
            .iter()
            .find(|(_, new)| new.as_str() == final_name)
            .map_or(final_name, |(old, _)| old.as_str())
    }
}

impl Catalog {
    /// Applies a resolved plan to the catalog, so later changes in the
    /// same batch see earlier results.
    pub fn apply_plan(&mut self, plan: &TablePlan) {
        for dep in &plan.dependents {
            if let Some(existing) = self.get_table_mut(&dep.table.name) {
                *existing = dep.table.clone();
            }
        }
        if plan.create {
            self.tables.push(plan.table.clone());
        } else if let Some(pos) = self.tables.iter().position(|t| t.name == plan.old_name) {
            self.tables[pos] = plan.table.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};

    fn empty_plan(table: Table) -> TablePlan {
        TablePlan {
            create: false,
            old_name: table.name.clone(),
            table,
            column_renames: BTreeMap::new(),
            dropped_columns: vec![],
            added_columns: vec![],
            altered_columns: vec![],
            redefined_columns: vec![],
            positions: BTreeMap::new(),
            dropped_indexes: vec![],
            added_indexes: vec![],
            altered_indexes: vec![],
            dropped_foreign_keys: vec![],
            added_foreign_keys: vec![],
            altered_foreign_keys: vec![],
            options_changed: false,
            dependents: vec![],
        }
    }

    #[test]
    fn test_is_noop() {
        let plan = empty_plan(Table::new("users"));
        assert!(plan.is_noop());

        let mut create = empty_plan(Table::new("users"));
        create.create = true;
        assert!(!create.is_noop());
    }

    #[test]
    fn test_old_column_name() {
        let mut plan = empty_plan(Table::new("users"));
        plan.column_renames
            .insert("username".to_string(), "login".to_string());

        assert_eq!(plan.old_column_name("login"), "username");
        assert_eq!(plan.old_column_name("email"), "email");
    }

    #[test]
    fn test_catalog_apply_plan_replaces_table() {
        let mut catalog = Catalog::new().table(
            Table::new("users").column(Column::new("id", ColumnType::BigInt)),
        );

        let mut renamed = Table::new("accounts");
        renamed.columns = vec![Column::new("id", ColumnType::BigInt)];
        let mut plan = empty_plan(renamed);
        plan.old_name = "users".to_string();
        catalog.apply_plan(&plan);

        assert!(catalog.get_table("users").is_none());
        assert!(catalog.get_table("accounts").is_some());
    }
}
