//! The change resolver.
//!
//! [`Resolver::resolve`] merges a declarative [`TableChange`] against
//! the current catalog in three ordered passes — columns, indexes,
//! foreign keys — tracking the old→new column name mapping so renames
//! propagate into index and constraint definitions, then cross-checks
//! every other table's foreign keys against the merged result. All
//! referential-integrity validation happens here, before any DDL is
//! rendered.

use std::collections::{BTreeMap, BTreeSet};

use crate::change::{ColumnPosition, Command, TableChange};
use crate::error::{Result, SchemaError};
use crate::plan::{DependentRewrite, TablePlan};
use crate::schema::{Catalog, Column, ForeignKey, Index, IndexKind, KeyKind, Table};

/// Resolves change requests against a catalog.
#[derive(Debug)]
pub struct Resolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the given catalog.
    #[must_use]
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Resolves one table change into an executable plan.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] describing the first violated
    /// invariant; nothing is partially resolved on failure.
    pub fn resolve(&self, change: &TableChange) -> Result<TablePlan> {
        let current = self.current_table(change)?;
        let new_name = change
            .rename
            .clone()
            .unwrap_or_else(|| change.table.clone());
        if new_name != change.table && self.catalog.get_table(&new_name).is_some() {
            return Err(SchemaError::TableExists(new_name));
        }

        let mut ctx = MergeContext::new(change, &current);
        ctx.merge_columns()?;
        ctx.merge_indexes()?;
        ctx.merge_foreign_keys(&new_name)?;

        let merged = Table {
            name: new_name.clone(),
            columns: ctx.columns.clone(),
            indexes: ctx.indexes.clone(),
            foreign_keys: ctx.foreign_keys.clone(),
            engine: change.engine.clone().or_else(|| current.engine.clone()),
            charset: change.charset.clone().or_else(|| current.charset.clone()),
            collation: change
                .collation
                .clone()
                .or_else(|| current.collation.clone()),
        };

        for fk in &merged.foreign_keys {
            self.validate_foreign_key(&merged, fk)?;
        }

        let dependents = if change.create {
            Vec::new()
        } else {
            self.rewrite_dependents(change, &ctx, &merged, &new_name)?
        };

        let options_changed = merged.engine != current.engine
            || merged.charset != current.charset
            || merged.collation != current.collation;

        Ok(TablePlan {
            create: change.create,
            old_name: change.table.clone(),
            table: merged,
            column_renames: ctx.renames,
            dropped_columns: ctx.dropped.into_iter().collect(),
            added_columns: ctx.added_columns,
            altered_columns: ctx.altered_columns,
            redefined_columns: ctx.redefined_columns,
            positions: ctx.positions,
            dropped_indexes: ctx.dropped_indexes,
            added_indexes: ctx.added_indexes,
            altered_indexes: ctx.altered_indexes,
            dropped_foreign_keys: ctx.dropped_foreign_keys,
            added_foreign_keys: ctx.added_foreign_keys,
            altered_foreign_keys: ctx.altered_foreign_keys,
            options_changed,
            dependents,
        })
    }

    fn current_table(&self, change: &TableChange) -> Result<Table> {
        if change.create {
            if self.catalog.get_table(&change.table).is_some() {
                return Err(SchemaError::TableExists(change.table.clone()));
            }
            Ok(Table::new(&change.table))
        } else {
            self.catalog
                .get_table(&change.table)
                .cloned()
                .ok_or_else(|| SchemaError::TableNotFound(change.table.clone()))
        }
    }

    /// Validates one merged foreign key against the merged table and
    /// the catalog (invariants 3–6).
    fn validate_foreign_key(&self, table: &Table, fk: &ForeignKey) -> Result<()> {
        if fk.columns.is_empty() || fk.columns.len() != fk.references_columns.len() {
            return Err(SchemaError::ForeignKeyArity {
                table: table.name.clone(),
                constraint: fk.name.clone(),
                local: fk.columns.len(),
                referenced: fk.references_columns.len(),
            });
        }

        let referenced = if fk.references_table == table.name {
            table
        } else {
            self.catalog
                .get_table(&fk.references_table)
                .ok_or_else(|| SchemaError::ReferencedTableNotFound {
                    table: table.name.clone(),
                    constraint: fk.name.clone(),
                    references: fk.references_table.clone(),
                })?
        };

        for (local_name, ref_name) in fk.columns.iter().zip(&fk.references_columns) {
            let local = table.get_column(local_name).ok_or_else(|| {
                SchemaError::ForeignKeyColumnMissing {
                    table: table.name.clone(),
                    constraint: fk.name.clone(),
                    column: local_name.clone(),
                }
            })?;
            let refd = referenced.get_column(ref_name).ok_or_else(|| {
                SchemaError::ReferencedColumnNotFound {
                    table: table.name.clone(),
                    constraint: fk.name.clone(),
                    references: fk.references_table.clone(),
                    column: ref_name.clone(),
                }
            })?;

            if let Err(reason) = key_columns_compatible(local, refd) {
                return Err(SchemaError::IncompatibleKeyColumns {
                    table: table.name.clone(),
                    constraint: fk.name.clone(),
                    local: local_name.clone(),
                    references: fk.references_table.clone(),
                    referenced: ref_name.clone(),
                    reason,
                });
            }
        }

        if !table.has_index_covering(&fk.columns) {
            return Err(SchemaError::ForeignKeyNotIndexed {
                table: table.name.clone(),
                constraint: fk.name.clone(),
                columns: fk.columns.join(", "),
            });
        }

        if !referenced.has_unique_index_on(&fk.references_columns) {
            return Err(SchemaError::ReferencedColumnsNotUnique {
                table: table.name.clone(),
                constraint: fk.name.clone(),
                references: fk.references_table.clone(),
                columns: fk.references_columns.join(", "),
            });
        }

        Ok(())
    }

    /// Cross-checks every other table's foreign keys that reference the
    /// changed table, propagating renames and re-validating retypes
    /// (invariants 7–8).
    fn rewrite_dependents(
        &self,
        change: &TableChange,
        ctx: &MergeContext<'_>,
        merged: &Table,
        new_name: &str,
    ) -> Result<Vec<DependentRewrite>> {
        let redefined: BTreeSet<&str> =
            ctx.redefined_columns.iter().map(String::as_str).collect();
        let mut dependents = Vec::new();

        for other in &self.catalog.tables {
            if other.name == change.table {
                continue;
            }

            let mut updated = other.clone();
            let mut rewritten = Vec::new();
            let mut retyped = false;

            for fk in &mut updated.foreign_keys {
                if fk.references_table != change.table {
                    continue;
                }

                let mut refs_changed = false;
                for ref_col in &mut fk.references_columns {
                    if ctx.dropped.contains(ref_col) {
                        return Err(SchemaError::ReferencedColumnDropped {
                            table: change.table.clone(),
                            column: ref_col.clone(),
                            referencing: other.name.clone(),
                            constraint: fk.name.clone(),
                        });
                    }
                    if let Some(new) = ctx.renames.get(ref_col) {
                        *ref_col = new.clone();
                        refs_changed = true;
                    }
                    if merged.get_column(ref_col).is_none() {
                        return Err(SchemaError::ReferencedColumnDropped {
                            table: change.table.clone(),
                            column: ref_col.clone(),
                            referencing: other.name.clone(),
                            constraint: fk.name.clone(),
                        });
                    }
                    if redefined.contains(ref_col.as_str()) {
                        retyped = true;
                    }
                }

                if new_name != change.table {
                    fk.references_table = new_name.to_string();
                    refs_changed = true;
                }

                for (local_name, ref_name) in fk.columns.iter().zip(&fk.references_columns) {
                    let local = other.get_column(local_name).ok_or_else(|| {
                        SchemaError::ForeignKeyColumnMissing {
                            table: other.name.clone(),
                            constraint: fk.name.clone(),
                            column: local_name.clone(),
                        }
                    })?;
                    // Existence was checked above.
                    if let Some(refd) = merged.get_column(ref_name) {
                        if let Err(reason) = key_columns_compatible(local, refd) {
                            return Err(SchemaError::IncompatibleKeyColumns {
                                table: other.name.clone(),
                                constraint: fk.name.clone(),
                                local: local_name.clone(),
                                references: merged.name.clone(),
                                referenced: ref_name.clone(),
                                reason,
                            });
                        }
                    }
                }

                if !merged.has_unique_index_on(&fk.references_columns) {
                    return Err(SchemaError::ReferencedColumnsNotUnique {
                        table: other.name.clone(),
                        constraint: fk.name.clone(),
                        references: merged.name.clone(),
                        columns: fk.references_columns.join(", "),
                    });
                }

                if refs_changed {
                    rewritten.push(fk.name.clone());
                }
            }

            if !rewritten.is_empty() || retyped {
                dependents.push(DependentRewrite {
                    table: updated,
                    rewritten,
                    retyped,
                });
            }
        }

        Ok(dependents)
    }
}

/// Mutable merge state shared by the three passes.
struct MergeContext<'c> {
    change: &'c TableChange,
    table_name: &'c str,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    foreign_keys: Vec<ForeignKey>,
    current: &'c Table,
    renames: BTreeMap<String, String>,
    dropped: BTreeSet<String>,
    added_columns: Vec<String>,
    altered_columns: Vec<String>,
    redefined_columns: Vec<String>,
    positions: BTreeMap<String, ColumnPosition>,
    dropped_indexes: Vec<String>,
    added_indexes: Vec<String>,
    altered_indexes: Vec<String>,
    dropped_foreign_keys: Vec<String>,
    added_foreign_keys: Vec<String>,
    altered_foreign_keys: Vec<String>,
}

impl<'c> MergeContext<'c> {
    fn new(change: &'c TableChange, current: &'c Table) -> Self {
        Self {
            change,
            table_name: &change.table,
            columns: current.columns.clone(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            current,
            renames: BTreeMap::new(),
            dropped: BTreeSet::new(),
            added_columns: Vec::new(),
            altered_columns: Vec::new(),
            redefined_columns: Vec::new(),
            positions: BTreeMap::new(),
            dropped_indexes: Vec::new(),
            added_indexes: Vec::new(),
            altered_indexes: Vec::new(),
            dropped_foreign_keys: Vec::new(),
            added_foreign_keys: Vec::new(),
            altered_foreign_keys: Vec::new(),
        }
    }

    fn reject_in_create(&self, command: Command, name: &str) -> Result<()> {
        if self.change.create && command != Command::Add {
            return Err(SchemaError::InvalidCreateCommand {
                table: self.table_name.to_string(),
                command: command.as_str().to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Resolves a column reference through the rename map.
    fn resolve_name(&self, name: &str) -> String {
        self.renames
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn column_exists(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    fn insert_column(&mut self, column: Column, position: Option<&ColumnPosition>) -> Result<()> {
        let name = column.name.clone();
        match position {
            None => self.columns.push(column),
            Some(ColumnPosition::First) => {
                self.columns.insert(0, column);
                self.positions.insert(name, ColumnPosition::First);
            }
            Some(ColumnPosition::After(anchor)) => {
                let anchor = self.resolve_name(anchor);
                let at = self
                    .columns
                    .iter()
                    .position(|c| c.name == anchor)
                    .ok_or_else(|| SchemaError::PositionNotFound {
                        table: self.table_name.to_string(),
                        column: name.clone(),
                        after: anchor.clone(),
                    })?;
                self.columns.insert(at + 1, column);
                self.positions.insert(name, ColumnPosition::After(anchor));
            }
        }
        Ok(())
    }

    // ---- pass 1: columns ------------------------------------------

    fn merge_columns(&mut self) -> Result<()> {
        for cc in &self.change.columns {
            self.reject_in_create(cc.command, &cc.name)?;
            match cc.command {
                Command::Add => {
                    if self.column_exists(&cc.name) {
                        return Err(SchemaError::ColumnExists {
                            table: self.table_name.to_string(),
                            column: cc.name.clone(),
                        });
                    }
                    let column_type = cc.column_type.clone().ok_or_else(|| {
                        SchemaError::MissingColumnType {
                            table: self.table_name.to_string(),
                            column: cc.name.clone(),
                        }
                    })?;
                    let mut column = Column::new(&cc.name, column_type);
                    column.unsigned = cc.unsigned.unwrap_or(false);
                    column.nullable = cc.nullable.unwrap_or(true);
                    if let Some(default) = &cc.default {
                        column.default = default.clone();
                    }
                    column.auto_increment = cc.auto_increment.unwrap_or(false);
                    if column.auto_increment {
                        column.nullable = false;
                    }
                    column.collation = cc.collation.clone();
                    column.comment = cc.comment.clone();

                    self.insert_column(column, cc.position.as_ref())?;
                    self.added_columns.push(cc.name.clone());
                }
                Command::Alter => {
                    let at = self
                        .columns
                        .iter()
                        .position(|c| c.name == cc.name)
                        .ok_or_else(|| SchemaError::ColumnNotFound {
                            table: self.table_name.to_string(),
                            column: cc.name.clone(),
                        })?;
                    let old = self.columns[at].clone();
                    let mut column = old.clone();

                    if let Some(column_type) = &cc.column_type {
                        column.column_type = column_type.clone();
                    }
                    if let Some(unsigned) = cc.unsigned {
                        column.unsigned = unsigned;
                    }
                    if let Some(nullable) = cc.nullable {
                        column.nullable = nullable;
                    }
                    if let Some(default) = &cc.default {
                        column.default = default.clone();
                    }
                    if let Some(auto_increment) = cc.auto_increment {
                        column.auto_increment = auto_increment;
                        if auto_increment {
                            column.nullable = false;
                        }
                    }
                    if let Some(collation) = &cc.collation {
                        column.collation = Some(collation.clone());
                    }
                    if let Some(comment) = &cc.comment {
                        column.comment = Some(comment.clone());
                    }

                    let mut final_name = cc.name.clone();
                    if let Some(new_name) = &cc.rename {
                        if new_name != &cc.name {
                            if self.column_exists(new_name) {
                                return Err(SchemaError::ColumnExists {
                                    table: self.table_name.to_string(),
                                    column: new_name.clone(),
                                });
                            }
                            column.name = new_name.clone();
                            final_name = new_name.clone();
                            // Chain through an earlier rename in the
                            // same batch if there is one.
                            let origin = self
                                .renames
                                .iter()
                                .find(|(_, v)| v.as_str() == cc.name)
                                .map(|(k, _)| k.clone());
                            match origin {
                                Some(key) => {
                                    self.renames.insert(key, new_name.clone());
                                }
                                None => {
                                    self.renames.insert(cc.name.clone(), new_name.clone());
                                }
                            }
                        }
                    }

                    if definition_changed(&old, &column) {
                        self.redefined_columns.push(final_name.clone());
                    }

                    if let Some(position) = cc.position.clone() {
                        self.columns.remove(at);
                        self.insert_column(column, Some(&position))?;
                    } else {
                        self.columns[at] = column;
                    }
                    self.altered_columns.push(final_name);
                }
                Command::Drop => {
                    let at = self
                        .columns
                        .iter()
                        .position(|c| c.name == cc.name)
                        .ok_or_else(|| SchemaError::ColumnNotFound {
                            table: self.table_name.to_string(),
                            column: cc.name.clone(),
                        })?;
                    self.columns.remove(at);
                    self.dropped.insert(cc.name.clone());
                }
            }
        }

        let mut auto = self.columns.iter().filter(|c| c.auto_increment);
        if let (Some(first), Some(second)) = (auto.next(), auto.next()) {
            return Err(SchemaError::MultipleAutoIncrement {
                table: self.table_name.to_string(),
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }

        Ok(())
    }

    // ---- pass 2: indexes ------------------------------------------

    /// True when a change carries a drop or alter for the named object.
    fn index_touched(&self, name: &str) -> bool {
        self.change
            .indexes
            .iter()
            .any(|ic| ic.name == name && ic.command != Command::Add)
    }

    fn remap_index_columns(&self, index: &str, columns: &[String]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(columns.len());
        for column in columns {
            let resolved = self.resolve_name(column);
            if !self.column_exists(&resolved) {
                return Err(SchemaError::IndexColumnMissing {
                    table: self.table_name.to_string(),
                    index: index.to_string(),
                    column: column.clone(),
                });
            }
            out.push(resolved);
        }
        Ok(out)
    }

    fn merge_indexes(&mut self) -> Result<()> {
        // Carry current indexes through the rename map. An index left
        // pointing at a dropped column is only acceptable when the same
        // batch drops or alters that index.
        for index in &self.current.indexes {
            let mut carried = index.clone();
            for column in &mut carried.columns {
                if let Some(new) = self.renames.get(column) {
                    *column = new.clone();
                }
            }
            if !self.index_touched(&index.name) {
                for column in &carried.columns {
                    if !self.column_exists(column) {
                        return Err(SchemaError::IndexColumnMissing {
                            table: self.table_name.to_string(),
                            index: index.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
            }
            self.indexes.push(carried);
        }

        for ic in &self.change.indexes {
            self.reject_in_create(ic.command, &ic.name)?;
            match ic.command {
                Command::Add => {
                    if self.indexes.iter().any(|i| i.name == ic.name) {
                        return Err(SchemaError::IndexExists {
                            table: self.table_name.to_string(),
                            index: ic.name.clone(),
                        });
                    }
                    let columns = ic.columns.clone().unwrap_or_default();
                    if columns.is_empty() {
                        return Err(SchemaError::EmptyIndex {
                            table: self.table_name.to_string(),
                            index: ic.name.clone(),
                        });
                    }
                    let columns = self.remap_index_columns(&ic.name, &columns)?;
                    self.indexes.push(Index {
                        name: ic.name.clone(),
                        kind: ic.kind.unwrap_or(IndexKind::Index),
                        columns,
                        implicit: false,
                    });
                    self.added_indexes.push(ic.name.clone());
                }
                Command::Alter => {
                    let at = self
                        .indexes
                        .iter()
                        .position(|i| i.name == ic.name)
                        .ok_or_else(|| SchemaError::IndexNotFound {
                            table: self.table_name.to_string(),
                            index: ic.name.clone(),
                        })?;
                    let mut index = self.indexes[at].clone();
                    if let Some(kind) = ic.kind {
                        index.kind = kind;
                    }
                    match &ic.columns {
                        Some(columns) => {
                            index.columns = self.remap_index_columns(&ic.name, columns)?;
                        }
                        None => {
                            // Inherited columns were remapped above but
                            // must still exist.
                            for column in &index.columns {
                                if !self.column_exists(column) {
                                    return Err(SchemaError::IndexColumnMissing {
                                        table: self.table_name.to_string(),
                                        index: ic.name.clone(),
                                        column: column.clone(),
                                    });
                                }
                            }
                        }
                    }
                    if index.columns.is_empty() {
                        return Err(SchemaError::EmptyIndex {
                            table: self.table_name.to_string(),
                            index: ic.name.clone(),
                        });
                    }
                    index.implicit = false;
                    self.indexes[at] = index;
                    self.altered_indexes.push(ic.name.clone());
                }
                Command::Drop => {
                    let at = self
                        .indexes
                        .iter()
                        .position(|i| i.name == ic.name)
                        .ok_or_else(|| SchemaError::IndexNotFound {
                            table: self.table_name.to_string(),
                            index: ic.name.clone(),
                        })?;
                    self.indexes.remove(at);
                    self.dropped_indexes.push(ic.name.clone());
                }
            }
        }

        let mut primaries = self.indexes.iter().filter(|i| i.kind == IndexKind::Primary);
        if let (Some(first), Some(second)) = (primaries.next(), primaries.next()) {
            return Err(SchemaError::MultiplePrimaryKeys {
                table: self.table_name.to_string(),
                first: first.name.clone(),
                second: second.name.clone(),
            });
        }

        if let Some(auto) = self.columns.iter().find(|c| c.auto_increment) {
            let covered = self
                .indexes
                .iter()
                .any(|i| i.kind == IndexKind::Primary && i.columns.contains(&auto.name));
            if !covered {
                return Err(SchemaError::AutoIncrementNotPrimary {
                    table: self.table_name.to_string(),
                    column: auto.name.clone(),
                });
            }
        }

        Ok(())
    }

    // ---- pass 3: foreign keys -------------------------------------

    fn foreign_key_touched(&self, name: &str) -> bool {
        self.change
            .foreign_keys
            .iter()
            .any(|fc| fc.name == name && fc.command != Command::Add)
    }

    fn remap_local_columns(&self, constraint: &str, columns: &[String]) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(columns.len());
        for column in columns {
            let resolved = self.resolve_name(column);
            if !self.column_exists(&resolved) {
                return Err(SchemaError::ForeignKeyColumnMissing {
                    table: self.table_name.to_string(),
                    constraint: constraint.to_string(),
                    column: column.clone(),
                });
            }
            out.push(resolved);
        }
        Ok(out)
    }

    fn merge_foreign_keys(&mut self, new_table_name: &str) -> Result<()> {
        for fk in &self.current.foreign_keys {
            let mut carried = fk.clone();
            for column in &mut carried.columns {
                if let Some(new) = self.renames.get(column) {
                    *column = new.clone();
                }
            }
            let self_reference = fk.references_table == self.current.name;
            if self_reference {
                for column in &mut carried.references_columns {
                    if let Some(new) = self.renames.get(column) {
                        *column = new.clone();
                    }
                }
                carried.references_table = new_table_name.to_string();
            }
            if !self.foreign_key_touched(&fk.name) {
                for column in carried
                    .columns
                    .iter()
                    .chain(self_reference.then_some(&carried.references_columns).into_iter().flatten())
                {
                    if !self.column_exists(column) {
                        return Err(SchemaError::ForeignKeyColumnMissing {
                            table: self.table_name.to_string(),
                            constraint: fk.name.clone(),
                            column: column.clone(),
                        });
                    }
                }
            }
            self.foreign_keys.push(carried);
        }

        for fc in &self.change.foreign_keys {
            self.reject_in_create(fc.command, &fc.name)?;
            match fc.command {
                Command::Add => {
                    if self.foreign_keys.iter().any(|fk| fk.name == fc.name) {
                        return Err(SchemaError::ForeignKeyExists {
                            table: self.table_name.to_string(),
                            constraint: fc.name.clone(),
                        });
                    }
                    let (Some(columns), Some(references_table), Some(references_columns)) = (
                        fc.columns.clone(),
                        fc.references_table.clone(),
                        fc.references_columns.clone(),
                    ) else {
                        return Err(SchemaError::IncompleteForeignKey {
                            table: self.table_name.to_string(),
                            constraint: fc.name.clone(),
                        });
                    };

                    let columns = self.remap_local_columns(&fc.name, &columns)?;
                    let self_reference = references_table == self.current.name
                        || references_table == new_table_name;
                    let (references_table, references_columns) = if self_reference {
                        let remapped = references_columns
                            .iter()
                            .map(|c| self.resolve_name(c))
                            .collect();
                        (new_table_name.to_string(), remapped)
                    } else {
                        (references_table, references_columns)
                    };

                    let mut fk = ForeignKey::new(
                        fc.name.clone(),
                        columns,
                        references_table,
                        references_columns,
                    );
                    fk.on_update = fc.on_update.unwrap_or_default();
                    fk.on_delete = fc.on_delete.unwrap_or_default();
                    self.foreign_keys.push(fk);
                    self.added_foreign_keys.push(fc.name.clone());
                }
                Command::Alter => {
                    let at = self
                        .foreign_keys
                        .iter()
                        .position(|fk| fk.name == fc.name)
                        .ok_or_else(|| SchemaError::ForeignKeyNotFound {
                            table: self.table_name.to_string(),
                            constraint: fc.name.clone(),
                        })?;
                    let mut fk = self.foreign_keys[at].clone();
                    if let Some(columns) = &fc.columns {
                        fk.columns = self.remap_local_columns(&fc.name, columns)?;
                    } else {
                        for column in &fk.columns {
                            if !self.column_exists(column) {
                                return Err(SchemaError::ForeignKeyColumnMissing {
                                    table: self.table_name.to_string(),
                                    constraint: fc.name.clone(),
                                    column: column.clone(),
                                });
                            }
                        }
                    }
                    if let Some(references_table) = &fc.references_table {
                        fk.references_table = references_table.clone();
                    }
                    if let Some(references_columns) = &fc.references_columns {
                        fk.references_columns = references_columns.clone();
                    }
                    if fk.references_table == self.current.name {
                        fk.references_table = new_table_name.to_string();
                    }
                    if let Some(on_update) = fc.on_update {
                        fk.on_update = on_update;
                    }
                    if let Some(on_delete) = fc.on_delete {
                        fk.on_delete = on_delete;
                    }
                    self.foreign_keys[at] = fk;
                    self.altered_foreign_keys.push(fc.name.clone());
                }
                Command::Drop => {
                    let at = self
                        .foreign_keys
                        .iter()
                        .position(|fk| fk.name == fc.name)
                        .ok_or_else(|| SchemaError::ForeignKeyNotFound {
                            table: self.table_name.to_string(),
                            constraint: fc.name.clone(),
                        })?;
                    self.foreign_keys.remove(at);
                    self.dropped_foreign_keys.push(fc.name.clone());
                }
            }
        }

        Ok(())
    }
}

/// Compares two columns ignoring their names.
fn definition_changed(old: &Column, new: &Column) -> bool {
    let mut old = old.clone();
    let mut new = new.clone();
    old.name.clear();
    new.name.clear();
    old != new
}

/// Checks whether a local/referenced column pair can form a foreign
/// key: both key-eligible, same kind, and within the kind: exact type
/// and signedness for numeric/binary kinds, equal collation for text
/// kinds, same coarse type for temporal kinds.
fn key_columns_compatible(local: &Column, referenced: &Column) -> std::result::Result<(), String> {
    let local_kind = local
        .key_kind()
        .ok_or_else(|| "local column type cannot be used in a key".to_string())?;
    let ref_kind = referenced
        .key_kind()
        .ok_or_else(|| "referenced column type cannot be used in a key".to_string())?;
    if local_kind != ref_kind {
        return Err("column type kinds differ".to_string());
    }

    match local_kind {
        KeyKind::Integer
        | KeyKind::Decimal
        | KeyKind::Float
        | KeyKind::Boolean
        | KeyKind::Binary => {
            if local.column_type != referenced.column_type {
                return Err("types must match exactly".to_string());
            }
            if local.unsigned != referenced.unsigned {
                return Err("signedness differs".to_string());
            }
            Ok(())
        }
        KeyKind::Text => {
            if local.collation != referenced.collation {
                return Err("collations differ".to_string());
            }
            Ok(())
        }
        KeyKind::Date | KeyKind::Time | KeyKind::DateTime | KeyKind::Year => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{ColumnChange, ForeignKeyChange, IndexChange};
    use crate::schema::{ColumnType, RefAction};

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", ColumnType::BigInt).unsigned().auto_increment())
            .column(Column::new("email", ColumnType::Varchar(255)).not_null())
            .column(Column::new("bio", ColumnType::Text))
            .index(Index::primary(vec!["id".to_string()]))
            .index(Index::unique("uniq_email", vec!["email".to_string()]))
    }

    fn posts() -> Table {
        Table::new("posts")
            .column(Column::new("id", ColumnType::BigInt).unsigned().auto_increment())
            .column(Column::new("user_id", ColumnType::BigInt).unsigned().not_null())
            .index(Index::primary(vec!["id".to_string()]))
            .index(Index::new("idx_user", vec!["user_id".to_string()]))
            .foreign_key(
                ForeignKey::new(
                    "fk_posts_user",
                    vec!["user_id".to_string()],
                    "users",
                    vec!["id".to_string()],
                )
                .on_delete(RefAction::Cascade),
            )
    }

    fn catalog() -> Catalog {
        Catalog::new().table(users()).table(posts())
    }

    #[test]
    fn test_noop_alter_round_trips() {
        let catalog = catalog();
        let plan = Resolver::new(&catalog)
            .resolve(&TableChange::alter("users"))
            .unwrap();

        assert!(plan.is_noop());
        assert_eq!(plan.table, *catalog.get_table("users").unwrap());
    }

    #[test]
    fn test_create_table() {
        let catalog = Catalog::new();
        let change = TableChange::create("tags")
            .column(ColumnChange::add("id", ColumnType::Int).set_auto_increment(true))
            .column(ColumnChange::add("label", ColumnType::Varchar(64)).set_nullable(false))
            .index(IndexChange::add_primary(vec!["id".to_string()]));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(plan.create);
        assert_eq!(plan.table.columns.len(), 2);
        assert_eq!(plan.table.primary_index().unwrap().columns, vec!["id"]);
    }

    #[test]
    fn test_create_rejects_alter_and_drop() {
        let catalog = Catalog::new();
        let change = TableChange::create("tags").column(ColumnChange::drop("x"));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCreateCommand { .. }));
    }

    #[test]
    fn test_add_column_with_position() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::add("nick", ColumnType::Varchar(32)).after("id"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let names: Vec<&str> = plan.table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "nick", "email", "bio"]);
        assert_eq!(
            plan.positions.get("nick"),
            Some(&ColumnPosition::After("id".to_string()))
        );
    }

    #[test]
    fn test_alter_inherits_unset_attributes() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::alter("email").set_type(ColumnType::Varchar(512)));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        let email = plan.table.get_column("email").unwrap();
        assert_eq!(email.column_type, ColumnType::Varchar(512));
        // Inherited from the current column, not reset.
        assert!(!email.nullable);
        assert_eq!(plan.redefined_columns, vec!["email"]);
    }

    #[test]
    fn test_rename_propagates_to_indexes_and_foreign_keys() {
        let mut catalog = catalog();
        // Make users self-referencing to exercise both sides.
        catalog
            .get_table_mut("users")
            .unwrap()
            .foreign_keys
            .push(ForeignKey::new(
                "fk_users_parent",
                vec!["parent_id".to_string()],
                "users",
                vec!["id".to_string()],
            ));
        catalog
            .get_table_mut("users")
            .unwrap()
            .columns
            .push(Column::new("parent_id", ColumnType::BigInt).unsigned());
        catalog
            .get_table_mut("users")
            .unwrap()
            .indexes
            .push(Index::new("idx_parent", vec!["parent_id".to_string()]));

        let change = TableChange::alter("users")
            .column(ColumnChange::alter("id").rename_to("user_id"))
            .column(ColumnChange::alter("email").rename_to("mail"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert_eq!(plan.table.primary_index().unwrap().columns, vec!["user_id"]);
        assert_eq!(
            plan.table.get_index("uniq_email").unwrap().columns,
            vec!["mail"]
        );
        assert_eq!(
            plan.table.get_foreign_key("fk_users_parent").unwrap().references_columns,
            vec!["user_id"]
        );
        // The dependent table's constraint is re-pointed too.
        assert_eq!(plan.dependents.len(), 1);
        let dep = &plan.dependents[0];
        assert_eq!(dep.table.name, "posts");
        assert_eq!(dep.rewritten, vec!["fk_posts_user"]);
        assert_eq!(
            dep.table.get_foreign_key("fk_posts_user").unwrap().references_columns,
            vec!["user_id"]
        );
    }

    #[test]
    fn test_drop_column_used_by_index_fails() {
        let catalog = catalog();
        let change = TableChange::alter("users").column(ColumnChange::drop("email"));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::IndexColumnMissing { .. }));
    }

    #[test]
    fn test_drop_column_with_its_index_succeeds() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::drop("email"))
            .index(IndexChange::drop("uniq_email"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(plan.table.get_column("email").is_none());
        assert!(plan.table.get_index("uniq_email").is_none());
        assert_eq!(plan.dropped_columns, vec!["email"]);
        assert_eq!(plan.dropped_indexes, vec!["uniq_email"]);
    }

    #[test]
    fn test_drop_column_used_by_own_foreign_key_fails() {
        let catalog = catalog();
        let change = TableChange::alter("posts")
            .column(ColumnChange::drop("user_id"))
            .index(IndexChange::drop("idx_user"));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::ForeignKeyColumnMissing { .. }));
    }

    #[test]
    fn test_drop_column_with_foreign_key_and_index_succeeds() {
        let catalog = catalog();
        let change = TableChange::alter("posts")
            .column(ColumnChange::drop("user_id"))
            .index(IndexChange::drop("idx_user"))
            .foreign_key(ForeignKeyChange::drop("fk_posts_user"));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(plan.table.foreign_keys.is_empty());
        assert_eq!(plan.dropped_foreign_keys, vec!["fk_posts_user"]);
    }

    #[test]
    fn test_two_primary_keys_fail() {
        let catalog = catalog();
        let change = TableChange::alter("users").index(
            IndexChange::add("pk2", IndexKind::Primary, vec!["email".to_string()]),
        );
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::MultiplePrimaryKeys { .. }));
    }

    #[test]
    fn test_two_auto_increment_columns_fail() {
        let catalog = catalog();
        let change = TableChange::alter("users").column(
            ColumnChange::add("seq", ColumnType::BigInt).set_auto_increment(true),
        );
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::MultipleAutoIncrement { .. }));
    }

    #[test]
    fn test_auto_increment_requires_primary_coverage() {
        let catalog = Catalog::new();
        let change = TableChange::create("tags")
            .column(ColumnChange::add("id", ColumnType::Int).set_auto_increment(true));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::AutoIncrementNotPrimary { .. }));
    }

    #[test]
    fn test_foreign_key_arity_mismatch_fails() {
        let catalog = catalog();
        let change = TableChange::alter("posts").foreign_key(
            ForeignKeyChange::alter("fk_posts_user")
                .references("users", vec!["id".to_string(), "email".to_string()]),
        );
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::ForeignKeyArity { .. }));
    }

    #[test]
    fn test_foreign_key_unknown_referenced_table_fails() {
        let catalog = catalog();
        let change = TableChange::alter("posts").foreign_key(ForeignKeyChange::add(
            "fk_posts_org",
            vec!["user_id".to_string()],
            "organizations",
            vec!["id".to_string()],
        ));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::ReferencedTableNotFound { .. }));
    }

    #[test]
    fn test_foreign_key_signedness_mismatch_fails() {
        let mut catalog = catalog();
        // Make the local column signed while users.id is unsigned.
        let posts = catalog.get_table_mut("posts").unwrap();
        let col = posts
            .columns
            .iter_mut()
            .find(|c| c.name == "user_id")
            .unwrap();
        col.unsigned = false;

        // Every surviving constraint is re-validated on resolve.
        let change = TableChange::alter("posts");
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleKeyColumns { .. }));
    }

    #[test]
    fn test_foreign_key_on_blob_column_fails() {
        let catalog = catalog();
        let change = TableChange::alter("posts")
            .column(ColumnChange::add("payload", ColumnType::Blob))
            .index(IndexChange::add(
                "idx_payload",
                IndexKind::Index,
                vec!["payload".to_string()],
            ))
            .foreign_key(ForeignKeyChange::add(
                "fk_payload",
                vec!["payload".to_string()],
                "users",
                vec!["id".to_string()],
            ));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleKeyColumns { .. }));
    }

    #[test]
    fn test_foreign_key_requires_local_index() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(
                ColumnChange::add("invited_by", ColumnType::BigInt).set_unsigned(true),
            )
            .foreign_key(ForeignKeyChange::add(
                "fk_invited_by",
                vec!["invited_by".to_string()],
                "users",
                vec!["id".to_string()],
            ));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::ForeignKeyNotIndexed { .. }));
    }

    #[test]
    fn test_foreign_key_index_added_in_same_change() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(
                ColumnChange::add("invited_by", ColumnType::BigInt).set_unsigned(true),
            )
            .index(IndexChange::add(
                "idx_invited_by",
                IndexKind::Index,
                vec!["invited_by".to_string()],
            ))
            .foreign_key(ForeignKeyChange::add(
                "fk_invited_by",
                vec!["invited_by".to_string()],
                "users",
                vec!["id".to_string()],
            ));

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(plan.table.get_foreign_key("fk_invited_by").is_some());
    }

    #[test]
    fn test_foreign_key_referencing_non_unique_columns_fails() {
        let catalog = catalog();
        let change = TableChange::alter("posts").foreign_key(
            ForeignKeyChange::alter("fk_posts_user")
                .set_columns(vec!["user_id".to_string()])
                .references("users", vec!["bio".to_string()]),
        );
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        // bio is TEXT: rejected as a key column before uniqueness.
        assert!(matches!(err, SchemaError::IncompatibleKeyColumns { .. }));
    }

    #[test]
    fn test_drop_referenced_column_fails() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::drop("id"))
            .index(IndexChange::drop("PRIMARY"));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::ReferencedColumnDropped { .. }));
    }

    #[test]
    fn test_retype_referenced_column_marks_dependent() {
        let catalog = catalog();
        // Any definition change on a referenced column marks the
        // dependent, even one that keeps the pair compatible.
        let change = TableChange::alter("users").column(
            ColumnChange::alter("id").set_comment("surrogate key"),
        );

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert_eq!(plan.dependents.len(), 1);
        assert!(plan.dependents[0].retyped);
        assert!(plan.dependents[0].rewritten.is_empty());
    }

    #[test]
    fn test_retype_referenced_column_incompatible_fails() {
        let catalog = catalog();
        let change = TableChange::alter("users")
            .column(ColumnChange::alter("id").set_type(ColumnType::Int));
        let err = Resolver::new(&catalog).resolve(&change).unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleKeyColumns { .. }));
    }

    #[test]
    fn test_rename_table_updates_dependents() {
        let catalog = catalog();
        let change = TableChange::alter("users").rename_to("accounts");

        let plan = Resolver::new(&catalog).resolve(&change).unwrap();
        assert!(plan.renamed());
        assert_eq!(plan.table.name, "accounts");
        let dep = &plan.dependents[0];
        assert_eq!(
            dep.table.get_foreign_key("fk_posts_user").unwrap().references_table,
            "accounts"
        );
    }

    #[test]
    fn test_unknown_table_fails() {
        let catalog = Catalog::new();
        let err = Resolver::new(&catalog)
            .resolve(&TableChange::alter("ghost"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::TableNotFound(_)));
    }

    #[test]
    fn test_create_existing_table_fails() {
        let catalog = catalog();
        let err = Resolver::new(&catalog)
            .resolve(&TableChange::create("users"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::TableExists(_)));
    }
}
