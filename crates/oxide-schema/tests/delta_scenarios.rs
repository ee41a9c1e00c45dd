//! End-to-end delta scenarios over the public API.
//!
//! The live database is stood in for by [`ActualTable::from_desired`], which
//! reports a table exactly as the database does right after the table's
//! patch was applied.

use oxide_schema::prelude::*;

fn people() -> Table {
    Table::builder("people")
        .column(Column::new("id", "int").primary_key())
        .column(Column::new("first_name", "varchar(100)"))
        .column(Column::new("last_name", "varchar(100)"))
        .column(Column::new("user_name", "varchar(50)").not_null())
        .column(Column::new("data", "jsonb"))
        .build()
        .unwrap()
}

/// The live table after applying whatever patch reconciles it with `table`.
fn applied(table: &Table) -> ActualTable {
    ActualTable::from_desired(table)
}

#[test]
fn absent_table_is_create() {
    let delta = find_delta(&people(), None);
    assert_eq!(delta.difference, SchemaPatchDifference::Create);
    assert!(delta.columns.matched.is_empty());
    assert!(delta.indexes.matched.is_empty());
    assert!(delta.foreign_keys.matched.is_empty());

    let patch = build_patch(&delta);
    assert!(patch.sql()[0].starts_with("CREATE TABLE public.people"));
}

#[test]
fn freshly_created_table_has_no_changes() {
    let table = people();
    let delta = find_delta(&table, Some(&applied(&table)));
    assert_eq!(delta.difference, SchemaPatchDifference::None);
    assert!(!delta.has_changes());
}

#[test]
fn scenario_a_added_column_is_missing() {
    let live = applied(&people());
    let desired = people()
        .modify()
        .column(Column::new("birth_day", "date"))
        .build()
        .unwrap();

    let delta = find_delta(&desired, Some(&live));
    assert_eq!(delta.difference, SchemaPatchDifference::Update);
    assert_eq!(delta.columns.missing.len(), 1);
    assert_eq!(delta.columns.missing[0].name, "birth_day");
    assert!(delta.columns.extras.is_empty());
    assert!(delta.columns.different.is_empty());
}

#[test]
fn scenario_b_removed_column_is_extra() {
    let with_birth_day = people()
        .modify()
        .column(Column::new("birth_day", "date"))
        .build()
        .unwrap();
    let live = applied(&with_birth_day);

    let delta = find_delta(&people(), Some(&live));
    assert_eq!(delta.difference, SchemaPatchDifference::Update);
    assert_eq!(delta.columns.extras.len(), 1);
    assert_eq!(delta.columns.extras[0].name, "birth_day");
    assert!(delta.columns.missing.is_empty());
    assert_eq!(
        build_patch(&delta).sql(),
        vec!["ALTER TABLE public.people DROP COLUMN birth_day"]
    );
}

#[test]
fn scenario_c_unique_index_then_repatch_is_none() {
    let live = applied(&people());
    let desired = people()
        .modify()
        .modify_column("user_name", Column::unique)
        .build()
        .unwrap();

    let delta = find_delta(&desired, Some(&live));
    assert_eq!(delta.difference, SchemaPatchDifference::Update);
    assert_eq!(delta.indexes.missing.len(), 1);
    assert_eq!(delta.indexes.missing[0].name(), "idx_people_user_name");
    assert_eq!(
        build_patch(&delta).sql(),
        vec!["CREATE UNIQUE INDEX idx_people_user_name ON public.people (user_name)"]
    );

    let delta = find_delta(&desired, Some(&applied(&desired)));
    assert_eq!(delta.difference, SchemaPatchDifference::None);
}

#[test]
fn scenario_d_dropped_foreign_key_is_extra() {
    let with_state = people()
        .modify()
        .column(Column::new("state_id", "int"))
        .foreign_key(ForeignKeyDefinition::new("state_id", "states", "id"))
        .build()
        .unwrap();

    let delta = find_delta(&with_state, Some(&applied(&people())));
    assert_eq!(delta.foreign_keys.missing.len(), 1);
    let live = applied(&with_state);
    assert!(!find_delta(&with_state, Some(&live)).has_changes());

    let without_fk = with_state
        .modify()
        .remove_foreign_key("fkey_people_state_id")
        .build()
        .unwrap();
    let delta = find_delta(&without_fk, Some(&live));
    assert_eq!(delta.difference, SchemaPatchDifference::Update);
    assert_eq!(delta.foreign_keys.extras.len(), 1);
    assert_eq!(delta.foreign_keys.extras[0].name, "fkey_people_state_id");
    assert!(delta.columns.extras.is_empty());
    assert_eq!(
        build_patch(&delta).sql(),
        vec!["ALTER TABLE public.people DROP CONSTRAINT fkey_people_state_id"]
    );
}

#[test]
fn type_synonyms_are_not_differences() {
    let table = people();
    let mut live = applied(&table);
    for column in &mut live.columns {
        column.data_type = match column.data_type.as_str() {
            "int" => "integer".to_string(),
            "varchar(100)" => "character varying(100)".to_string(),
            "varchar(50)" => "CHARACTER VARYING(50)".to_string(),
            other => other.to_string(),
        };
    }
    let delta = find_delta(&table, Some(&live));
    assert_eq!(delta.difference, SchemaPatchDifference::None);
}

#[test]
fn catalog_rendering_of_an_index_matches() {
    let table = people()
        .modify()
        .modify_column("user_name", Column::unique)
        .build()
        .unwrap();
    let mut live = applied(&table);
    live.indexes[0].definition =
        "CREATE UNIQUE INDEX idx_people_user_name ON public.people USING btree (user_name)"
            .to_string();
    assert!(!find_delta(&table, Some(&live)).has_changes());
}

#[test]
fn renamed_index_is_missing_plus_extra() {
    let old = people()
        .modify()
        .index(IndexDefinition::on_columns(["user_name"]).named("idx_old"))
        .build()
        .unwrap();
    let new = people()
        .modify()
        .index(IndexDefinition::on_columns(["user_name"]).named("idx_new"))
        .build()
        .unwrap();

    let delta = find_delta(&new, Some(&applied(&old)));
    assert_eq!(delta.indexes.missing.len(), 1);
    assert_eq!(delta.indexes.extras.len(), 1);
    assert!(delta.indexes.different.is_empty());
    assert!(delta.indexes.matched.is_empty());
    assert_eq!(delta.difference, SchemaPatchDifference::Update);
}

#[test]
fn every_single_change_is_at_least_update() {
    let table = people();
    let base = applied(&table);

    let mut extra_column = base.clone();
    extra_column.columns.push(ActualColumn {
        name: "nickname".into(),
        data_type: "text".into(),
        nullable: true,
        default: None,
    });
    let mut extra_index = base.clone();
    extra_index.indexes.push(ActualIndex {
        name: "idx_people_data".into(),
        definition: "CREATE INDEX idx_people_data ON public.people USING gin (data)".into(),
    });
    let mut different_column = base.clone();
    different_column.columns[1].nullable = false;

    for live in [extra_column, extra_index, different_column] {
        let delta = find_delta(&table, Some(&live));
        assert!(delta.difference >= SchemaPatchDifference::Update);
    }
}

#[test]
fn applying_the_patch_converges() {
    let old = people();
    let new = people()
        .modify()
        .remove_column("last_name")
        .modify_column("id", |c| Column {
            db_type: "bigint".into(),
            ..c
        })
        .column(Column::new("created", "timestamptz").default_value("now()"))
        .index(IndexDefinition::on_columns(["created"]))
        .build()
        .unwrap();

    let delta = find_delta(&new, Some(&applied(&old)));
    assert_eq!(delta.difference, SchemaPatchDifference::Update);
    assert!(build_patch(&delta).is_complete());
    assert!(!find_delta(&new, Some(&applied(&new))).has_changes());
}

#[test]
fn irreconcilable_change_is_surfaced_with_detail() {
    let table = people();
    let mut live = applied(&table);
    live.columns[0].data_type = "uuid".into();

    let delta = find_delta(&table, Some(&live));
    assert_eq!(delta.difference, SchemaPatchDifference::Invalid);
    let err = build_patch(&delta).ensure_reconcilable().unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("public.people"), "{msg}");
    assert!(msg.contains("column id: expected int, actual uuid"), "{msg}");

    let rebuild = build_rebuild(&table);
    assert_eq!(rebuild.sql()[0], "DROP TABLE IF EXISTS public.people CASCADE");
}

#[test]
fn delta_serializes_for_reporting() {
    let live = applied(&people());
    let desired = people()
        .modify()
        .column(Column::new("birth_day", "date"))
        .build()
        .unwrap();
    let json = serde_json::to_value(find_delta(&desired, Some(&live))).unwrap();
    assert_eq!(json["difference"], "update");
    assert_eq!(json["columns"]["missing"][0]["name"], "birth_day");
}
