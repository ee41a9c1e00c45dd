//! Schema migrator.
//!
//! Composes the reader, the delta detector, the patch generator and the
//! executor: fetch, compare, consult the auto-create policy, patch, then
//! re-fetch and confirm.

use oxide_schema::canonical::Canonicalizer;
use oxide_schema::delta::{DeltaDetector, SchemaPatchDifference, TableDelta};
use oxide_schema::introspect::{DdlExecutor, SchemaReader};
use oxide_schema::model::Table;
use oxide_schema::patch::{DdlDialect, PostgresDdl, SchemaPatch};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MigratorOptions;
use crate::error::{MigrateError, Result};
use crate::types::PgTypeProvider;

/// One table's delta and the patch the migrator would execute for it.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    /// The comparison result.
    pub delta: TableDelta,
    /// Statements to execute. A rebuild for `Invalid` tables when the
    /// policy is `All`, otherwise the incremental patch.
    pub patch: SchemaPatch,
    /// Whether the auto-create policy allows executing `patch`.
    pub permitted: bool,
}

impl MigrationPlan {
    /// Returns `true` if there is nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !self.delta.has_changes()
    }
}

/// Brings live tables in line with their declarations.
pub struct SchemaMigrator<R, E> {
    reader: R,
    executor: E,
    detector: DeltaDetector<PgTypeProvider>,
    dialect: PostgresDdl,
    options: MigratorOptions,
}

impl<R, E> SchemaMigrator<R, E>
where
    R: SchemaReader,
    E: DdlExecutor,
    MigrateError: From<R::Error> + From<E::Error>,
{
    /// Creates a migrator with the built-in PostgreSQL types.
    pub fn new(reader: R, executor: E, options: MigratorOptions) -> Self {
        Self::with_types(reader, executor, options, PgTypeProvider::new())
    }

    /// Creates a migrator with a type provider carrying custom types.
    pub fn with_types(
        reader: R,
        executor: E,
        options: MigratorOptions,
        types: PgTypeProvider,
    ) -> Self {
        Self {
            reader,
            executor,
            detector: DeltaDetector::new(Canonicalizer::postgres(), types),
            dialect: PostgresDdl::new(),
            options,
        }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &MigratorOptions {
        &self.options
    }

    /// Returns the schema reader.
    #[must_use]
    pub const fn reader(&self) -> &R {
        &self.reader
    }

    /// Compares one table with the database.
    pub async fn delta(&self, table: &Table) -> Result<TableDelta> {
        let actual = self.reader.fetch_existing(table.name()).await?;
        Ok(self.detector.find_delta(table, actual.as_ref()))
    }

    /// Plans one table without executing anything.
    pub async fn plan(&self, table: &Table) -> Result<MigrationPlan> {
        let delta = self.delta(table).await?;
        let rebuild = delta.difference == SchemaPatchDifference::Invalid
            && self.options.auto_create.permits(SchemaPatchDifference::Invalid);
        let patch = if rebuild {
            self.dialect.build_rebuild(table)
        } else {
            self.dialect.build_patch(&delta)
        };
        let permitted = self.options.auto_create.permits(delta.difference);
        Ok(MigrationPlan {
            delta,
            patch,
            permitted,
        })
    }

    /// Plans every table without executing anything.
    pub async fn preview(&self, tables: &[Table]) -> Result<Vec<MigrationPlan>> {
        let mut plans = Vec::with_capacity(tables.len());
        for table in tables {
            plans.push(self.plan(table).await?);
        }
        Ok(plans)
    }

    /// Applies every table's patch, in order.
    ///
    /// All tables are planned before anything executes; if the policy
    /// refuses any change nothing is applied. Returns the plans that were
    /// executed.
    pub async fn apply(&self, tables: &[Table]) -> Result<Vec<MigrationPlan>> {
        let plans = self.preview(tables).await?;

        if let Some(plan) = plans.iter().find(|p| !p.is_noop() && !p.permitted) {
            warn!(
                table = %plan.delta.table,
                difference = %plan.delta.difference,
                policy = %self.options.auto_create,
                "Change not allowed by auto-create policy"
            );
            if plan.delta.difference == SchemaPatchDifference::Invalid {
                plan.patch.ensure_reconcilable()?;
            }
            return Err(MigrateError::Unapplied {
                table: plan.delta.table.to_string(),
                difference: plan.delta.difference,
            });
        }

        let mut applied = Vec::new();
        for (table, plan) in tables.iter().zip(plans) {
            if plan.is_noop() {
                debug!(table = %plan.delta.table, "Table is up to date");
                continue;
            }
            info!(
                table = %plan.delta.table,
                difference = %plan.delta.difference,
                statements = plan.patch.statements.len(),
                "Applying schema patch"
            );
            self.executor
                .execute(&plan.patch.statements, self.options.transactional)
                .await?;

            if self.options.confirm_after_apply {
                let after = self.delta(table).await?;
                if after.has_changes() {
                    warn!(
                        table = %after.table,
                        categories = ?after.changed_categories(),
                        "Table still differs after patch"
                    );
                    return Err(MigrateError::Mismatch {
                        tables: vec![after.table.to_string()],
                    });
                }
            }
            applied.push(plan);
        }
        Ok(applied)
    }

    /// Fails with [`MigrateError::Mismatch`] if any table differs from its
    /// declaration.
    pub async fn assert_matches(&self, tables: &[Table]) -> Result<()> {
        let mut differing = Vec::new();
        for table in tables {
            let delta = self.delta(table).await?;
            if delta.has_changes() {
                debug!(table = %delta.table, difference = %delta.difference, "Drift detected");
                differing.push(delta.table.to_string());
            }
        }
        if differing.is_empty() {
            Ok(())
        } else {
            Err(MigrateError::Mismatch { tables: differing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use oxide_schema::actual::ActualTable;
    use oxide_schema::model::{Column, TableName};
    use oxide_schema::patch::PatchStatement;
    use oxide_schema::policy::AutoCreate;
    use oxide_schema::SchemaError;

    /// An in-memory database. Executing any patch publishes the staged
    /// post-patch state of every table.
    #[derive(Default)]
    struct FakeDb {
        tables: HashMap<String, ActualTable>,
        staged: HashMap<String, ActualTable>,
        executed: Vec<PatchStatement>,
        transactional: Vec<bool>,
    }

    #[derive(Clone, Default)]
    struct Fake(Arc<Mutex<FakeDb>>);

    impl Fake {
        fn with_table(self, actual: ActualTable) -> Self {
            self.0
                .lock()
                .unwrap()
                .tables
                .insert(actual.name.to_string(), actual);
            self
        }

        fn staging(self, actual: ActualTable) -> Self {
            self.0
                .lock()
                .unwrap()
                .staged
                .insert(actual.name.to_string(), actual);
            self
        }

        fn executed(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .executed
                .iter()
                .map(|s| s.sql.clone())
                .collect()
        }
    }

    impl SchemaReader for Fake {
        type Error = MigrateError;

        async fn fetch_existing(&self, table: &TableName) -> Result<Option<ActualTable>> {
            Ok(self.0.lock().unwrap().tables.get(&table.to_string()).cloned())
        }
    }

    impl DdlExecutor for Fake {
        type Error = MigrateError;

        async fn execute(&self, statements: &[PatchStatement], transactional: bool) -> Result<()> {
            let mut db = self.0.lock().unwrap();
            db.executed.extend_from_slice(statements);
            db.transactional.push(transactional);
            let staged = std::mem::take(&mut db.staged);
            db.tables.extend(staged);
            Ok(())
        }
    }

    fn people() -> Table {
        Table::builder("people")
            .column(Column::new("id", "int").primary_key())
            .column(Column::new("user_name", "varchar(50)").not_null())
            .build()
            .unwrap()
    }

    fn with_birth_day() -> Table {
        people()
            .modify()
            .column(Column::new("birth_day", "date"))
            .build()
            .unwrap()
    }

    fn migrator(fake: &Fake, auto_create: AutoCreate) -> SchemaMigrator<Fake, Fake> {
        SchemaMigrator::new(
            fake.clone(),
            fake.clone(),
            MigratorOptions::with_auto_create(auto_create),
        )
    }

    #[tokio::test]
    async fn creates_missing_table_and_confirms() {
        let fake = Fake::default().staging(ActualTable::from_desired(&people()));
        let applied = migrator(&fake, AutoCreate::CreateOnly)
            .apply(&[people()])
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].delta.difference, SchemaPatchDifference::Create);
        assert!(fake.executed()[0].starts_with("CREATE TABLE public.people"));
        assert_eq!(fake.0.lock().unwrap().transactional, vec![true]);
    }

    #[tokio::test]
    async fn up_to_date_table_executes_nothing() {
        let fake = Fake::default().with_table(ActualTable::from_desired(&people()));
        let applied = migrator(&fake, AutoCreate::None)
            .apply(&[people()])
            .await
            .unwrap();
        assert!(applied.is_empty());
        assert!(fake.executed().is_empty());
    }

    #[tokio::test]
    async fn policy_refusal_applies_nothing() {
        let fake = Fake::default().with_table(ActualTable::from_desired(&people()));
        let err = migrator(&fake, AutoCreate::CreateOnly)
            .apply(&[with_birth_day()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Unapplied {
                difference: SchemaPatchDifference::Update,
                ..
            }
        ));
        assert!(fake.executed().is_empty());
    }

    #[tokio::test]
    async fn patches_existing_table() {
        let fake = Fake::default()
            .with_table(ActualTable::from_desired(&people()))
            .staging(ActualTable::from_desired(&with_birth_day()));
        migrator(&fake, AutoCreate::CreateOrUpdate)
            .apply(&[with_birth_day()])
            .await
            .unwrap();
        assert_eq!(
            fake.executed(),
            vec!["ALTER TABLE public.people ADD COLUMN birth_day date"]
        );
    }

    #[tokio::test]
    async fn unconfirmed_patch_is_a_mismatch() {
        let fake = Fake::default().with_table(ActualTable::from_desired(&people()));
        let err = migrator(&fake, AutoCreate::CreateOrUpdate)
            .apply(&[with_birth_day()])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Mismatch { ref tables } if tables == &["public.people"]));
    }

    #[tokio::test]
    async fn invalid_table_is_reported_unless_rebuild_allowed() {
        let mut live = ActualTable::from_desired(&people());
        live.columns[0].data_type = "uuid".into();

        let fake = Fake::default().with_table(live.clone());
        let err = migrator(&fake, AutoCreate::CreateOrUpdate)
            .apply(&[people()])
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Schema(SchemaError::Irreconcilable { .. })));
        assert!(fake.executed().is_empty());

        let fake = Fake::default()
            .with_table(live)
            .staging(ActualTable::from_desired(&people()));
        migrator(&fake, AutoCreate::All)
            .apply(&[people()])
            .await
            .unwrap();
        assert_eq!(fake.executed()[0], "DROP TABLE IF EXISTS public.people CASCADE");
    }

    #[tokio::test]
    async fn preview_does_not_execute() {
        let fake = Fake::default().with_table(ActualTable::from_desired(&people()));
        let plans = migrator(&fake, AutoCreate::None)
            .preview(&[with_birth_day()])
            .await
            .unwrap();
        assert_eq!(plans.len(), 1);
        assert!(!plans[0].permitted);
        assert_eq!(plans[0].patch.statements.len(), 1);
        assert!(fake.executed().is_empty());
    }

    #[tokio::test]
    async fn assert_matches_lists_drifted_tables() {
        let fake = Fake::default().with_table(ActualTable::from_desired(&people()));
        let m = migrator(&fake, AutoCreate::None);
        m.assert_matches(&[people()]).await.unwrap();

        let states = Table::builder("crm.states")
            .column(Column::new("id", "int").primary_key())
            .build()
            .unwrap();
        let err = m
            .assert_matches(&[with_birth_day(), states])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MigrateError::Mismatch { ref tables } if tables == &["public.people", "crm.states"]
        ));
    }
}
