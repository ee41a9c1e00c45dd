//! Dialect-specific DDL rendering.

use tracing::debug;

use crate::delta::{
    storage_type, ColumnAlteration, PrimaryKeyChange, SchemaPatchDifference, TableDelta,
};
use crate::ident;
use crate::model::{Column, DEFAULT_SCHEMA, IndexDefinition, Table, TableName};

use super::{PatchStatement, SchemaPatch};

/// Renders DDL statements for one database dialect and assembles them into
/// ordered patches.
pub trait DdlDialect {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Quotes an identifier when needed.
    fn quote_identifier(&self, name: &str) -> String {
        ident::quote_identifier(name)
    }

    /// Generates SQL for a column definition.
    fn column_definition(&self, column: &Column) -> String {
        let mut sql = format!("{} {}", self.quote_identifier(&column.name), column.db_type);
        if !column.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(ref default) = column.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    /// Generates SQL that creates a schema if missing.
    fn create_schema(&self, schema: &str) -> String;

    /// Generates SQL for CREATE TABLE with columns and primary key.
    fn create_table(&self, table: &Table) -> String {
        let mut defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("    {}", self.column_definition(c)))
            .collect();
        if let Some(pk) = table.primary_key() {
            defs.push(format!("    {}", pk.constraint_sql()));
        }
        format!("CREATE TABLE {} (\n{}\n)", table.name().to_sql(), defs.join(",\n"))
    }

    /// Generates SQL for DROP TABLE.
    fn drop_table(&self, table: &TableName) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", table.to_sql())
    }

    /// Generates SQL for ADD COLUMN.
    fn add_column(&self, table: &TableName, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            table.to_sql(),
            self.column_definition(column)
        )
    }

    /// Generates SQL for DROP COLUMN.
    fn drop_column(&self, table: &TableName, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            table.to_sql(),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL that changes a column's type.
    fn alter_column_type(&self, table: &TableName, column: &str, db_type: &str) -> String;

    /// Generates SQL that sets or drops a column default.
    fn set_default(&self, table: &TableName, column: &str, default: Option<&str>) -> String {
        let action = match default {
            Some(expr) => format!("SET DEFAULT {expr}"),
            None => "DROP DEFAULT".to_string(),
        };
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            table.to_sql(),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL that sets or drops NOT NULL.
    fn set_nullable(&self, table: &TableName, column: &str, nullable: bool) -> String {
        let action = if nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {action}",
            table.to_sql(),
            self.quote_identifier(column)
        )
    }

    /// Generates SQL that adds a table constraint.
    fn add_constraint(&self, table: &TableName, constraint: &str) -> String {
        format!("ALTER TABLE {} ADD {constraint}", table.to_sql())
    }

    /// Generates SQL that drops a table constraint.
    fn drop_constraint(&self, table: &TableName, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            table.to_sql(),
            self.quote_identifier(name)
        )
    }

    /// Generates SQL that renames a table constraint.
    fn rename_constraint(&self, table: &TableName, from: &str, to: &str) -> String;

    /// Generates the statement creating an index; concurrent builds run
    /// outside any transaction.
    fn create_index(&self, table: &TableName, index: &IndexDefinition) -> PatchStatement {
        let sql = index.to_ddl(table);
        if index.concurrently {
            PatchStatement::outside_transaction(sql)
        } else {
            PatchStatement::new(sql)
        }
    }

    /// Generates SQL for DROP INDEX.
    fn drop_index(&self, table: &TableName, name: &str) -> String;

    /// Statements that create `table` from nothing: its schema, the table
    /// with its primary key, its indexes, then its foreign keys.
    fn build_create(&self, table: &Table) -> SchemaPatch {
        let name = table.name();
        let mut statements = Vec::new();
        if !ident::same_identifier(&name.schema, DEFAULT_SCHEMA) {
            statements.push(PatchStatement::new(self.create_schema(&name.schema)));
        }
        statements.push(PatchStatement::new(self.create_table(table)));
        for index in table.indexes() {
            statements.push(self.create_index(name, index));
        }
        for fk in table.foreign_keys() {
            statements.push(PatchStatement::new(
                self.add_constraint(name, &fk.constraint_sql()),
            ));
        }
        debug!(
            dialect = self.name(),
            table = %name,
            statements = statements.len(),
            "Built create patch"
        );
        SchemaPatch {
            table: name.clone(),
            difference: SchemaPatchDifference::Create,
            statements,
            irreconcilable: Vec::new(),
        }
    }

    /// Statements that drop `table` and create it again. Data is lost.
    fn build_rebuild(&self, table: &Table) -> SchemaPatch {
        let mut patch = self.build_create(table);
        patch
            .statements
            .insert(0, PatchStatement::new(self.drop_table(table.name())));
        patch.difference = SchemaPatchDifference::Invalid;
        patch
    }

    /// Statements that reconcile the live table with the desired one.
    ///
    /// Changes that cannot be applied incrementally are left out and listed
    /// in [`SchemaPatch::irreconcilable`].
    fn build_patch(&self, delta: &TableDelta) -> SchemaPatch {
        let table = &delta.table;
        match delta.difference {
            SchemaPatchDifference::None => return SchemaPatch::empty(table.clone()),
            SchemaPatchDifference::Create => return self.build_create(&delta.desired),
            SchemaPatchDifference::Update | SchemaPatchDifference::Invalid => {}
        }

        let mut statements = Vec::new();
        let mut push = |sql: String| statements.push(PatchStatement::new(sql));
        let pk = &delta.primary_key;
        let pk_patchable = pk.difference != SchemaPatchDifference::Invalid;

        // 1. drops
        let stale_fks = delta
            .foreign_keys
            .extras
            .iter()
            .chain(delta.foreign_keys.different.iter().map(|d| &d.actual));
        for fk in stale_fks {
            push(self.drop_constraint(table, &fk.name));
        }
        let stale_indexes = delta
            .indexes
            .extras
            .iter()
            .chain(delta.indexes.different.iter().map(|d| &d.actual));
        for index in stale_indexes {
            push(self.drop_index(table, &index.name));
        }
        if pk_patchable && matches!(pk.change, PrimaryKeyChange::Drop | PrimaryKeyChange::Redefine) {
            if let Some(ref actual) = pk.actual {
                push(self.drop_constraint(table, &actual.name));
            }
        }

        // 2. columns
        for column in &delta.columns.missing {
            push(self.add_column(table, column));
        }
        for diff in &delta.columns.different {
            let name = diff.expected.name.as_str();
            for alteration in &diff.alterations {
                match alteration {
                    ColumnAlteration::Type { lossless: true, .. } => {
                        push(self.alter_column_type(table, name, storage_type(&diff.expected)));
                    }
                    ColumnAlteration::Type { lossless: false, .. } => {}
                    ColumnAlteration::Default { expected, .. } => {
                        push(self.set_default(table, name, expected.as_deref()));
                    }
                    ColumnAlteration::Nullability { nullable } => {
                        push(self.set_nullable(table, name, *nullable));
                    }
                }
            }
        }
        for column in &delta.columns.extras {
            push(self.drop_column(table, &column.name));
        }

        // 3. primary key
        if pk_patchable {
            match (pk.change, &pk.expected, &pk.actual) {
                (PrimaryKeyChange::Add | PrimaryKeyChange::Redefine, Some(expected), _) => {
                    push(self.add_constraint(table, &expected.constraint_sql()));
                }
                (PrimaryKeyChange::Rename, Some(expected), Some(actual)) => {
                    push(self.rename_constraint(table, &actual.name, &expected.name));
                }
                _ => {}
            }
        }

        // 4. indexes
        let wanted_indexes = delta
            .indexes
            .missing
            .iter()
            .chain(delta.indexes.different.iter().map(|d| &d.expected));
        for index in wanted_indexes {
            statements.push(self.create_index(table, index));
        }

        // 5. foreign keys
        let wanted_fks = delta
            .foreign_keys
            .missing
            .iter()
            .chain(delta.foreign_keys.different.iter().map(|d| &d.expected));
        for fk in wanted_fks {
            statements.push(PatchStatement::new(
                self.add_constraint(table, &fk.constraint_sql()),
            ));
        }

        debug!(
            dialect = self.name(),
            table = %table,
            difference = %delta.difference,
            statements = statements.len(),
            left_out = delta.invalid.len(),
            "Built patch"
        );
        SchemaPatch {
            table: table.clone(),
            difference: delta.difference,
            statements,
            irreconcilable: delta.invalid.clone(),
        }
    }
}
