//! PostgreSQL DDL.

use super::DdlDialect;
use crate::model::TableName;

/// PostgreSQL dialect for patch generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDdl;

impl PostgresDdl {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DdlDialect for PostgresDdl {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn create_schema(&self, schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {}", self.quote_identifier(schema))
    }

    fn alter_column_type(&self, table: &TableName, column: &str, db_type: &str) -> String {
        let column = self.quote_identifier(column);
        format!(
            "ALTER TABLE {} ALTER COLUMN {column} TYPE {db_type} USING {column}::{db_type}",
            table.to_sql()
        )
    }

    fn rename_constraint(&self, table: &TableName, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME CONSTRAINT {} TO {}",
            table.to_sql(),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    fn drop_index(&self, table: &TableName, name: &str) -> String {
        // Indexes live in their table's schema.
        format!(
            "DROP INDEX IF EXISTS {}.{}",
            self.quote_identifier(&table.schema),
            self.quote_identifier(name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actual::{ActualColumn, ActualTable};
    use crate::delta::{find_delta, SchemaPatchDifference};
    use crate::model::{Column, ForeignKeyAction, ForeignKeyDefinition, IndexDefinition, Table};
    use crate::patch::{build_create, build_patch, build_rebuild};

    fn people() -> Table {
        Table::builder("people")
            .column(Column::new("id", "int").primary_key())
            .column(Column::new("first_name", "varchar(100)"))
            .column(Column::new("user_name", "varchar(100)").not_null())
            .column(Column::new("data", "jsonb"))
            .build()
            .unwrap()
    }

    #[test]
    fn create_patch_orders_table_indexes_then_keys() {
        let table = Table::builder("crm.people")
            .column(Column::new("id", "serial").primary_key())
            .column(Column::new("Name", "text").default_value("''"))
            .column(Column::new("state_id", "int"))
            .index(IndexDefinition::on_columns(["Name"]).unique())
            .foreign_key(
                ForeignKeyDefinition::new("state_id", "crm.states", "id")
                    .on_delete(ForeignKeyAction::SetNull),
            )
            .build()
            .unwrap();
        let patch = build_create(&table);
        assert_eq!(patch.difference, SchemaPatchDifference::Create);
        assert_eq!(
            patch.sql(),
            vec![
                "CREATE SCHEMA IF NOT EXISTS crm",
                "CREATE TABLE crm.people (\n    id serial NOT NULL,\n    \"Name\" text DEFAULT '',\n    \
                 state_id int,\n    CONSTRAINT pkey_people_id PRIMARY KEY (id)\n)",
                "CREATE UNIQUE INDEX \"idx_people_Name\" ON crm.people (\"Name\")",
                "ALTER TABLE crm.people ADD CONSTRAINT fkey_people_state_id FOREIGN KEY (state_id) \
                 REFERENCES crm.states (id) ON DELETE SET NULL",
            ]
        );
    }

    #[test]
    fn public_schema_is_not_created() {
        let patch = build_create(&people());
        assert!(patch.sql()[0].starts_with("CREATE TABLE public.people"));
    }

    #[test]
    fn rebuild_drops_first() {
        let patch = build_rebuild(&people());
        assert_eq!(patch.sql()[0], "DROP TABLE IF EXISTS public.people CASCADE");
        assert!(patch.sql()[1].starts_with("CREATE TABLE"));
    }

    #[test]
    fn absent_table_patches_to_create() {
        let delta = find_delta(&people(), None);
        assert_eq!(build_patch(&delta), build_create(&people()));
    }

    #[test]
    fn no_changes_no_statements() {
        let table = people();
        let delta = find_delta(&table, Some(&ActualTable::from_desired(&table)));
        assert!(build_patch(&delta).is_empty());
    }

    #[test]
    fn update_patch_follows_dependency_order() {
        let old = people()
            .modify()
            .column(Column::new("legacy", "text"))
            .index(IndexDefinition::on_columns(["legacy"]))
            .foreign_key(ForeignKeyDefinition::new("legacy", "legacy_codes", "code"))
            .build()
            .unwrap();
        let new = people()
            .modify()
            .modify_column("id", |c| Column {
                db_type: "bigint".into(),
                ..c
            })
            .modify_column("first_name", |c| c.not_null().default_value("'x'"))
            .column(Column::new("birth_day", "date"))
            .index(
                IndexDefinition::on_columns(["user_name"])
                    .unique()
                    .concurrently(),
            )
            .foreign_key(ForeignKeyDefinition::new("id", "accounts", "id"))
            .build()
            .unwrap();
        let delta = find_delta(&new, Some(&ActualTable::from_desired(&old)));
        assert_eq!(delta.difference, SchemaPatchDifference::Update);

        let patch = build_patch(&delta);
        assert_eq!(
            patch.sql(),
            vec![
                "ALTER TABLE public.people DROP CONSTRAINT fkey_people_legacy",
                "DROP INDEX IF EXISTS public.idx_people_legacy",
                "ALTER TABLE public.people ADD COLUMN birth_day date",
                "ALTER TABLE public.people ALTER COLUMN id TYPE bigint USING id::bigint",
                "ALTER TABLE public.people ALTER COLUMN first_name SET NOT NULL",
                "ALTER TABLE public.people ALTER COLUMN first_name SET DEFAULT 'x'",
                "ALTER TABLE public.people DROP COLUMN legacy",
                "CREATE UNIQUE INDEX CONCURRENTLY idx_people_user_name ON public.people (user_name)",
                "ALTER TABLE public.people ADD CONSTRAINT fkey_people_id FOREIGN KEY (id) \
                 REFERENCES public.accounts (id)",
            ]
        );
        let concurrent: Vec<_> = patch.statements.iter().filter(|s| !s.transactional).collect();
        assert_eq!(concurrent.len(), 1);
        assert!(patch.is_complete());
    }

    #[test]
    fn primary_key_changes() {
        let table = people();
        let mut actual = ActualTable::from_desired(&table);
        actual.primary_key.as_mut().unwrap().name = "people_pkey".into();
        let patch = build_patch(&find_delta(&table, Some(&actual)));
        assert_eq!(
            patch.sql(),
            vec!["ALTER TABLE public.people RENAME CONSTRAINT people_pkey TO pkey_people_id"]
        );

        let composite = table
            .modify()
            .primary_key(["id", "user_name"])
            .build()
            .unwrap();
        let patch = build_patch(&find_delta(&composite, Some(&ActualTable::from_desired(&table))));
        assert_eq!(
            patch.sql(),
            vec![
                "ALTER TABLE public.people DROP CONSTRAINT pkey_people_id",
                "ALTER TABLE public.people ADD CONSTRAINT pkey_people_id_user_name PRIMARY KEY (id, user_name)",
            ]
        );
    }

    #[test]
    fn lossy_changes_are_left_out() {
        let table = people();
        let mut actual = ActualTable::from_desired(&table);
        actual.columns[3] = ActualColumn {
            name: "data".into(),
            data_type: "text".into(),
            nullable: false,
            default: None,
        };
        let delta = find_delta(&table, Some(&actual));
        assert_eq!(delta.difference, SchemaPatchDifference::Invalid);
        let patch = build_patch(&delta);
        assert_eq!(
            patch.sql(),
            vec!["ALTER TABLE public.people ALTER COLUMN data DROP NOT NULL"]
        );
        assert!(!patch.is_complete());
        assert!(patch.ensure_reconcilable().is_err());
    }
}
