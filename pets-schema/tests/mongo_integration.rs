//! Integration tests against a live MongoDB server.
//!
//! Run with `cargo test -- --ignored`. Each test works in its own throwaway
//! database named `pets_search_test_<objectid>` and drops it when done.
//! `MONGODB_URI` defaults to `mongodb://localhost:27017`.

use futures::TryStreamExt;
use mongodb::bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use mongodb::{Client, Database};
use serial_test::serial;

use pets_schema::executor::{MigrationContext, StepOutcome};
use pets_schema::{
    Event, EventType, Listing, ListingStatus, ListingType, MigrationRunner, SchemaError, User,
    is_document_validation_failure, is_duplicate_key, migrations, schema, schema::LiveState,
};

const HISTORY: &str = "_migrations";

// ============ Helper Functions ============

async fn test_database() -> Database {
    let uri = std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = Client::with_uri_str(&uri).await.expect("Failed to connect to MongoDB");
    client.database(&format!("pets_search_test_{}", ObjectId::new().to_hex()))
}

fn runner(db: &Database, dry_run: bool) -> MigrationRunner {
    let ctx = MigrationContext::from_database(db.clone()).with_dry_run(dry_run);
    MigrationRunner::new(ctx, HISTORY)
}

async fn deployed_database() -> Database {
    let db = test_database().await;
    runner(&db, false)
        .deploy(&migrations::all())
        .await
        .expect("deploy failed");
    db
}

/// Collection names without the migration history.
async fn schema_collections(db: &Database) -> Vec<String> {
    let mut names: Vec<String> = db
        .list_collection_names(None)
        .await
        .unwrap()
        .into_iter()
        .filter(|name| name != HISTORY)
        .collect();
    names.sort();
    names
}

async fn index_names(db: &Database, collection: &str) -> Vec<String> {
    let mut names = db.collection::<Document>(collection).list_index_names().await.unwrap();
    names.sort();
    names
}

/// Depth-first search for the first `indexName` in an explain plan.
fn find_index_name(value: &Bson) -> Option<String> {
    match value {
        Bson::Document(document) => {
            if let Ok(name) = document.get_str("indexName") {
                return Some(name.to_string());
            }
            document.values().find_map(find_index_name)
        }
        Bson::Array(items) => items.iter().find_map(find_index_name),
        _ => None,
    }
}

async fn winning_index(db: &Database, find: Document) -> Option<String> {
    let plan = db
        .run_command(doc! { "explain": find, "verbosity": "queryPlanner" }, None)
        .await
        .unwrap();
    find_index_name(&Bson::Document(plan))
}

// ============ Deploy ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn deploy_creates_exactly_the_declared_collections() {
    let db = test_database().await;
    let report = runner(&db, false).deploy(&migrations::all()).await.unwrap();

    assert_eq!(report.stats.migrations_applied, 2);
    assert_eq!(report.stats.steps_applied, 15);
    assert_eq!(report.stats.steps_skipped, 0);
    assert_eq!(schema_collections(&db).await, ["events", "listings", "users"]);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn deploy_creates_every_declared_index() {
    let db = deployed_database().await;

    assert_eq!(index_names(&db, "users").await, ["_id_", "email_1", "phone_1"]);
    assert_eq!(
        index_names(&db, "listings").await,
        ["_id_", "city_1", "created_at_-1", "slug_1", "status_1", "type_1", "user_id_1"]
    );
    assert_eq!(
        index_names(&db, "events").await,
        ["_id_", "created_at_-1", "listing_id_1", "type_1", "user_id_1"]
    );

    let indexes: Vec<_> = db
        .collection::<Document>("listings")
        .list_indexes(None)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    let slug = indexes
        .iter()
        .find(|index| index.options.as_ref().and_then(|o| o.name.as_deref()) == Some("slug_1"))
        .expect("slug index");
    let options = slug.options.as_ref().unwrap();
    assert_eq!(options.unique, Some(true));
    assert_eq!(options.sparse, Some(true));

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn redeploy_is_a_no_op() {
    let db = deployed_database().await;
    let runner = runner(&db, false);

    let report = runner.deploy(&migrations::all()).await.unwrap();
    assert!(report.is_up_to_date());
    assert_eq!(report.stats.migrations_skipped, 2);
    assert!(report.drifted.is_empty());
    assert_eq!(schema_collections(&db).await, ["events", "listings", "users"]);

    let status = runner.status(&migrations::all()).await.unwrap();
    assert!(status.iter().all(|migration| migration.is_applied()));
    assert!(status.iter().all(|migration| migration.checksum_matches == Some(true)));

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn deploy_without_history_skips_existing_objects() {
    let db = deployed_database().await;
    db.collection::<Document>(HISTORY).drop(None).await.unwrap();

    let report = runner(&db, false).deploy(&migrations::all()).await.unwrap();
    assert_eq!(report.stats.migrations_applied, 2);
    assert_eq!(report.stats.steps_applied, 0);
    assert_eq!(report.stats.steps_skipped, 15);
    assert!(
        report
            .runs
            .iter()
            .flat_map(|run| &run.steps)
            .all(|step| matches!(step.outcome, StepOutcome::Skipped(_)))
    );

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn dry_run_changes_nothing() {
    let db = test_database().await;
    let report = runner(&db, true).deploy(&migrations::all()).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.stats.steps_planned, 15);
    assert_eq!(report.stats.steps_applied, 0);
    assert!(
        report
            .runs
            .iter()
            .flat_map(|run| &run.steps)
            .all(|step| step.outcome == StepOutcome::Planned)
    );
    assert!(db.list_collection_names(None).await.unwrap().is_empty());

    db.drop(None).await.unwrap();
}

// ============ Conflicting Objects ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn non_unique_email_index_blocks_deploy() {
    let db = test_database().await;
    let runner = runner(&db, false);
    let plan = migrations::all();
    runner.deploy(&plan[..1]).await.unwrap();

    let plain = mongodb::IndexModel::builder().keys(doc! { "email": 1 }).build();
    db.collection::<Document>("users").create_index(plain, None).await.unwrap();

    let email = schema::indexes_for("users").into_iter().find(|index| index.field == "email").unwrap();
    let ctx = MigrationContext::from_database(db.clone());
    assert!(matches!(ctx.inspect_index(&email).await.unwrap(), LiveState::Differs(_)));

    match runner.deploy(&plan).await {
        Err(SchemaError::Conflict { collection, object, detail }) => {
            assert_eq!(collection, "users");
            assert_eq!(object, "index email_1");
            assert!(detail.contains("unique is false"));
        }
        other => panic!("expected a conflict, got {other:?}"),
    }

    let status = runner.status(&plan).await.unwrap();
    assert!(status[0].is_applied());
    assert!(!status[1].is_applied());

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn collection_without_validator_blocks_deploy() {
    let db = test_database().await;
    db.create_collection("listings", None).await.unwrap();

    let ctx = MigrationContext::from_database(db.clone());
    let state = ctx.inspect_collection(&schema::listings()).await.unwrap();
    assert_eq!(state, LiveState::Differs("collection has no validator".to_string()));

    let err = runner(&db, false).deploy(&migrations::all()).await.unwrap_err();
    assert!(matches!(
        err,
        SchemaError::Conflict { ref collection, ref object, .. } if collection == "listings" && object == "validator"
    ));
    assert_eq!(schema_collections(&db).await, ["listings", "users"]);

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn deployed_objects_match_their_declarations() {
    let db = deployed_database().await;
    let ctx = MigrationContext::from_database(db.clone());

    for collection in schema::collections() {
        assert!(ctx.inspect_collection(&collection).await.unwrap().matches(), "{}", collection.name);
    }
    for index in schema::indexes() {
        assert!(ctx.inspect_index(&index).await.unwrap().matches(), "{}", index.name());
    }

    db.drop(None).await.unwrap();
}

// ============ Validators ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn validator_rejects_user_without_email_or_created_at() {
    let db = deployed_database().await;
    let users = db.collection::<Document>("users");

    let err = users
        .insert_one(doc! { "name": "Ann", "created_at": DateTime::now() }, None)
        .await
        .unwrap_err();
    assert!(is_document_validation_failure(&err));

    let err = users.insert_one(doc! { "email": "a@x.com" }, None).await.unwrap_err();
    assert!(is_document_validation_failure(&err));

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn validator_rejects_wrong_kinds_and_enum_values() {
    let db = deployed_database().await;
    let listings = db.collection::<Document>("listings");

    let rejected = [
        doc! { "user_id": ObjectId::new(), "type": "sold", "title": "Cat", "status": "active", "created_at": DateTime::now() },
        doc! { "user_id": ObjectId::new(), "type": "lost", "title": "Cat", "status": "deleted", "created_at": DateTime::now() },
        doc! { "user_id": ObjectId::new().to_hex(), "type": "lost", "title": "Cat", "status": "active", "created_at": DateTime::now() },
        doc! { "user_id": ObjectId::new(), "type": "lost", "title": "Cat", "status": "active", "created_at": "2025-03-01" },
        doc! { "user_id": ObjectId::new(), "type": "lost", "title": "Cat", "status": "active", "slug": Bson::Null, "created_at": DateTime::now() },
    ];
    for document in rejected {
        let err = listings.insert_one(document.clone(), None).await.unwrap_err();
        assert!(is_document_validation_failure(&err), "expected rejection of {document}");
    }

    let event = doc! { "listing_id": ObjectId::new(), "type": "share", "created_at": DateTime::now() };
    let err = db.collection::<Document>("events").insert_one(event, None).await.unwrap_err();
    assert!(is_document_validation_failure(&err));

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn validator_accepts_fields_outside_the_schema() {
    let db = deployed_database().await;

    db.collection::<Document>("users")
        .insert_one(doc! { "email": "a@x.com", "created_at": DateTime::now(), "locale": "en" }, None)
        .await
        .unwrap();

    db.drop(None).await.unwrap();
}

// ============ Uniqueness ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn duplicate_email_is_rejected() {
    let db = deployed_database().await;
    let users = db.collection::<User>("users");

    users.insert_one(User::new("a@x.com"), None).await.unwrap();
    let err = users.insert_one(User::new("a@x.com"), None).await.unwrap_err();
    assert!(is_duplicate_key(&err));
    assert!(!is_document_validation_failure(&err));

    db.drop(None).await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn slug_is_unique_only_when_present() {
    let db = deployed_database().await;
    let listings = db.collection::<Listing>("listings");
    let owner = ObjectId::new();

    for _ in 0..2 {
        let listing = Listing::new(owner, ListingType::Lost, "Missing cat", ListingStatus::Draft);
        listings.insert_one(listing, None).await.unwrap();
    }

    let first = Listing::new(owner, ListingType::Found, "Found dog", ListingStatus::Active).with_slug("found-dog");
    listings.insert_one(first, None).await.unwrap();

    let second = Listing::new(owner, ListingType::Adopt, "Puppy", ListingStatus::Active).with_slug("found-dog");
    let err = listings.insert_one(second, None).await.unwrap_err();
    assert!(is_duplicate_key(&err));

    db.drop(None).await.unwrap();
}

// ============ Query Plans ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn event_queries_use_the_declared_indexes() {
    let db = deployed_database().await;
    let listing_id = ObjectId::new();
    db.collection::<Event>("events")
        .insert_one(Event::new(listing_id, EventType::View), None)
        .await
        .unwrap();

    let by_listing = winning_index(&db, doc! { "find": "events", "filter": { "listing_id": listing_id } }).await;
    assert_eq!(by_listing.as_deref(), Some("listing_id_1"));

    let recent = winning_index(
        &db,
        doc! {
            "find": "events",
            "filter": { "created_at": { "$gte": DateTime::from_millis(0) } },
            "sort": { "created_at": -1 },
        },
    )
    .await;
    assert_eq!(recent.as_deref(), Some("created_at_-1"));

    db.drop(None).await.unwrap();
}

// ============ Rollback ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn rollback_reverts_the_newest_migration() {
    let db = deployed_database().await;
    let runner = runner(&db, false);

    let report = runner.rollback_last(&migrations::all()).await.unwrap().expect("a migration to roll back");
    assert_eq!(report.name, "20250301_120100_create_indexes");
    assert_eq!(report.steps.len(), 12);
    assert_eq!(index_names(&db, "users").await, ["_id_"]);
    assert_eq!(schema_collections(&db).await, ["events", "listings", "users"]);

    let status = runner.status(&migrations::all()).await.unwrap();
    assert!(status[0].is_applied());
    assert!(!status[1].is_applied());

    // Deploying again restores only what was rolled back.
    let report = runner.deploy(&migrations::all()).await.unwrap();
    assert_eq!(report.stats.migrations_applied, 1);
    assert_eq!(report.stats.steps_applied, 12);

    db.drop(None).await.unwrap();
}

// ============ End to End ============

#[tokio::test]
#[serial]
#[ignore = "requires a running MongoDB"]
async fn user_listing_and_view_event_round_trip() {
    let db = deployed_database().await;

    let user = User::new("a@x.com");
    db.collection::<User>("users").insert_one(&user, None).await.unwrap();

    let listing = Listing::new(user.id, ListingType::Lost, "Missing cat", ListingStatus::Active);
    db.collection::<Listing>("listings").insert_one(&listing, None).await.unwrap();

    let event = Event::new(listing.id, EventType::View);
    db.collection::<Event>("events").insert_one(&event, None).await.unwrap();

    let stored: Vec<Event> = db
        .collection::<Event>("events")
        .find(doc! { "listing_id": listing.id }, None)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, EventType::View);
    assert!(stored[0].user_id.is_none());

    let found = db
        .collection::<Listing>("listings")
        .find_one(doc! { "user_id": user.id, "status": "active" }, None)
        .await
        .unwrap()
        .expect("listing by owner");
    assert_eq!(found.title, "Missing cat");
    assert_eq!(found.kind, ListingType::Lost);

    let err = db
        .collection::<User>("users")
        .insert_one(User::new("a@x.com"), None)
        .await
        .unwrap_err();
    assert!(is_duplicate_key(&err));

    assert_eq!(schema::indexes_for("events").len(), 4);
    db.drop(None).await.unwrap();
}
